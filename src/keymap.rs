//! Keyboard shortcut dispatch.
//!
//! Shortcuts reach a surface through two paths: the surface's own
//! command table (active only while focus sits inside the surface) and
//! a capture-phase listener on an enclosing container. The capture
//! phase runs first and marks the event handled, so a shortcut that is
//! registered both ways still fires exactly once per key press.
//!
//! `primary` means Ctrl on Linux/Windows and Cmd on macOS; bindings
//! treat the two as equivalent.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::store::watcher::Subscription;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub control: bool,
    pub platform: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn primary() -> Self {
        Self {
            control: true,
            ..Self::default()
        }
    }

    /// Ctrl and Cmd are interchangeable for shortcut purposes.
    pub fn is_primary(&self) -> bool {
        self.control || self.platform
    }
}

/// A key plus the modifier set that must be held, exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    key: String,
    primary: bool,
    shift: bool,
    alt: bool,
}

impl Binding {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_ascii_lowercase(),
            primary: false,
            shift: false,
            alt: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn matches(&self, event: &KeyDownEvent) -> bool {
        event.key.eq_ignore_ascii_case(&self.key)
            && event.modifiers.is_primary() == self.primary
            && event.modifiers.shift == self.shift
            && event.modifiers.alt == self.alt
    }
}

/// A key press travelling through the dispatcher. `handled` is sticky:
/// once a handler claims the event, later handlers skip it.
#[derive(Debug)]
pub struct KeyDownEvent {
    pub key: String,
    pub modifiers: Modifiers,
    handled: Cell<bool>,
}

impl KeyDownEvent {
    pub fn new(key: &str, modifiers: Modifiers) -> Self {
        Self {
            key: key.to_string(),
            modifiers,
            handled: Cell::new(false),
        }
    }

    pub fn mark_handled(&self) {
        self.handled.set(true);
    }

    pub fn is_handled(&self) -> bool {
        self.handled.get()
    }
}

type Handler = Rc<dyn Fn()>;

struct CaptureListener {
    id: u64,
    container: String,
    // Element focus must be inside for the listener to fire, beyond
    // the container the listener is attached to.
    require_focus: Option<String>,
    binding: Binding,
    handler: Handler,
}

struct Command {
    id: u64,
    scope: String,
    binding: Binding,
    handler: Handler,
}

#[derive(Default)]
struct DispatcherInner {
    next_id: u64,
    focus: Vec<String>,
    listeners: Vec<CaptureListener>,
    commands: Vec<Command>,
}

impl DispatcherInner {
    fn focus_within(&self, element: &str) -> bool {
        self.focus.iter().any(|e| e == element)
    }
}

/// Routes key presses to registered shortcuts based on where focus
/// currently sits. Single-threaded by construction, like the event
/// loop it models.
#[derive(Clone, Default)]
pub struct KeyDispatcher {
    inner: Rc<RefCell<DispatcherInner>>,
}

impl KeyDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the focus path from the root container down to the focused
    /// element. `focus_within` checks membership anywhere on the path.
    pub fn set_focus(&self, path: &[&str]) {
        self.inner.borrow_mut().focus = path.iter().map(|s| s.to_string()).collect();
    }

    pub fn focus_within(&self, element: &str) -> bool {
        self.inner.borrow().focus_within(element)
    }

    /// Register a capture-phase listener scoped to `container`. It only
    /// fires while focus is somewhere inside that container.
    pub fn add_capture_listener(
        &self,
        container: &str,
        binding: Binding,
        handler: Handler,
    ) -> Subscription {
        self.push_listener(container, None, binding, handler)
    }

    /// Capture-phase listener on an enclosing `container` that also
    /// requires focus to sit inside `focus`. This is the
    /// document-level-listener-with-focus-requirement shape a surface
    /// uses alongside its own command table.
    pub fn add_capture_listener_with_focus(
        &self,
        container: &str,
        focus: &str,
        binding: Binding,
        handler: Handler,
    ) -> Subscription {
        self.push_listener(container, Some(focus.to_string()), binding, handler)
    }

    fn push_listener(
        &self,
        container: &str,
        require_focus: Option<String>,
        binding: Binding,
        handler: Handler,
    ) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push(CaptureListener {
                id,
                container: container.to_string(),
                require_focus,
                binding,
                handler,
            });
            id
        };

        let inner = self.inner.clone();
        Subscription::new().on_drop(move || {
            inner.borrow_mut().listeners.retain(|l| l.id != id);
        })
    }

    /// Register a command on a surface's own table. Commands run after
    /// the capture phase and only while focus is inside `scope`.
    pub fn add_command(&self, scope: &str, binding: Binding, handler: Handler) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.commands.push(Command {
                id,
                scope: scope.to_string(),
                binding,
                handler,
            });
            id
        };

        let inner = self.inner.clone();
        Subscription::new().on_drop(move || {
            inner.borrow_mut().commands.retain(|c| c.id != id);
        })
    }

    /// Run a key press through the capture phase, then the command
    /// tables. Handlers are collected under the borrow and invoked
    /// outside it so they may re-enter the dispatcher.
    pub fn dispatch(&self, event: &KeyDownEvent) {
        if event.is_handled() {
            return;
        }

        let handler = {
            let inner = self.inner.borrow();
            inner
                .listeners
                .iter()
                .find(|l| {
                    inner.focus_within(&l.container)
                        && l.require_focus
                            .as_deref()
                            .is_none_or(|f| inner.focus_within(f))
                        && l.binding.matches(event)
                })
                .map(|l| l.handler.clone())
        };
        if let Some(handler) = handler {
            event.mark_handled();
            handler();
        }

        let handler = {
            let inner = self.inner.borrow();
            if event.is_handled() {
                None
            } else {
                inner
                    .commands
                    .iter()
                    .find(|c| inner.focus_within(&c.scope) && c.binding.matches(event))
                    .map(|c| c.handler.clone())
            }
        };
        if let Some(handler) = handler {
            event.mark_handled();
            handler();
        }
    }
}

/// The editor surface's shortcuts: primary+Enter runs the statement,
/// primary+S saves it. Both are registered on the editor's command
/// table and as capture listeners on an enclosing `container`, gated
/// on focus sitting inside the editor; the handled flag keeps each
/// press to a single invocation across the two paths. Dropping the
/// value unregisters everything.
pub struct EditorShortcuts {
    _subs: Subscription,
}

impl EditorShortcuts {
    pub fn mount(
        dispatcher: &KeyDispatcher,
        container: &str,
        editor: &str,
        on_run: Handler,
        on_save: Handler,
    ) -> Self {
        let run = Binding::new("enter").primary();
        let save = Binding::new("s").primary();
        let subs = Subscription::join([
            dispatcher.add_command(editor, run.clone(), on_run.clone()),
            dispatcher.add_capture_listener_with_focus(container, editor, run, on_run),
            dispatcher.add_command(editor, save.clone(), on_save.clone()),
            dispatcher.add_capture_listener_with_focus(container, editor, save, on_save),
        ]);
        Self { _subs: subs }
    }
}
