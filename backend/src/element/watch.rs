use super::{ParamHandler, ParamId, WatchId};
use autolimit_types::PropertyValue;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct Watcher<P> {
    id: WatchId,
    param: P,
    handler: Rc<ParamHandler>,
    active: Rc<Cell<bool>>,
}

/// Watch registry shared by the element implementations.
pub(super) struct Watchers<P> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<Watcher<P>>>,
}

impl<P: ParamId> Watchers<P> {
    pub(super) fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            entries: RefCell::new(Vec::new()),
        }
    }

    pub(super) fn add(&self, param: P, handler: ParamHandler) -> WatchId {
        let id = WatchId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push(Watcher {
            id,
            param,
            handler: Rc::new(handler),
            active: Rc::new(Cell::new(true)),
        });
        id
    }

    /// Remove a watcher, returning the parameter it was watching.
    pub(super) fn remove(&self, id: WatchId) -> Option<P> {
        let mut entries = self.entries.borrow_mut();
        let index = entries.iter().position(|w| w.id == id)?;
        let watcher = entries.remove(index);
        watcher.active.set(false);
        Some(watcher.param)
    }

    pub(super) fn is_watched(&self, param: P) -> bool {
        self.entries.borrow().iter().any(|w| w.param == param)
    }

    /// Call every handler of `param`.
    ///
    /// Handlers run without the registry borrowed, so they may write
    /// parameters or add and remove watches themselves.
    pub(super) fn notify(&self, param: P, value: &PropertyValue) {
        let targets: Vec<(Rc<ParamHandler>, Rc<Cell<bool>>)> = self
            .entries
            .borrow()
            .iter()
            .filter(|w| w.param == param)
            .map(|w| (w.handler.clone(), w.active.clone()))
            .collect();

        for (handler, active) in targets {
            if active.get() {
                handler(value);
            }
        }
    }
}
