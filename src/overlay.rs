// ============================================================================
// DRAGGABLE TEXT OVERLAY — selection + pointer-drag of text elements
// ============================================================================
//
// The overlay owns only interaction state (which element is selected, and
// the drag in progress). The element collection belongs to the editor and
// is mutated exclusively through `TextElements::update`.

use std::cell::Cell;
use std::rc::Rc;

use crate::coords::{self, ContainerBounds, PercentPoint, PixelPoint};
use crate::model::{TextElementPatch, TextElements};

// ============================================================================
// GLOBAL POINTER SUBSCRIPTIONS
// ============================================================================

/// Tracks listeners registered for pointer events outside any element's own
/// hit area (drags continue when the pointer leaves the element).
#[derive(Clone, Default)]
pub struct PointerHub {
    active: Rc<Cell<usize>>,
}

impl PointerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> PointerSubscription {
        self.active.set(self.active.get() + 1);
        PointerSubscription {
            active: Rc::clone(&self.active),
        }
    }

    /// Number of live subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.active.get()
    }
}

/// Released on drop.
pub struct PointerSubscription {
    active: Rc<Cell<usize>>,
}

impl Drop for PointerSubscription {
    fn drop(&mut self) {
        self.active.set(self.active.get().saturating_sub(1));
    }
}

// ============================================================================
// DRAG STATE MACHINE
// ============================================================================

struct DragSession {
    element_id: String,
    pointer_start: PixelPoint,
    element_start: PercentPoint,
    _subscription: PointerSubscription,
}

pub struct TextOverlay {
    selected: Option<String>,
    drag: Option<DragSession>,
    hub: PointerHub,
}

impl TextOverlay {
    pub fn new(hub: PointerHub) -> Self {
        Self {
            selected: None,
            drag: None,
            hub,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.as_deref() == Some(id)
    }

    /// Select `id`, replacing any previous selection.
    pub fn select(&mut self, id: &str) {
        self.selected = Some(id.to_string());
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn dragged_element(&self) -> Option<&str> {
        self.drag.as_ref().map(|d| d.element_id.as_str())
    }

    /// Pointer down over element `id`: select it and start a drag from its
    /// current position. Unknown ids are ignored.
    pub fn pointer_down_on(&mut self, id: &str, pointer: PixelPoint, elements: &TextElements) {
        let Some(element) = elements.get(id) else {
            return;
        };
        self.select(id);
        self.drag = Some(DragSession {
            element_id: id.to_string(),
            pointer_start: pointer,
            element_start: element.position(),
            _subscription: self.hub.subscribe(),
        });
    }

    /// Global pointer move. The displacement since pointer-down is converted
    /// against the container's bounds as passed in now, so a resize between
    /// drags does not skew the result. Returns true if an element moved.
    pub fn pointer_move(
        &mut self,
        pointer: PixelPoint,
        container: Option<&ContainerBounds>,
        elements: &mut TextElements,
    ) -> bool {
        let (Some(drag), Some(container)) = (self.drag.as_ref(), container) else {
            return false;
        };
        let dx = pointer.x - drag.pointer_start.x;
        let dy = pointer.y - drag.pointer_start.y;
        let Some(delta) = coords::delta_to_percent(dx, dy, container) else {
            return false;
        };
        let target = drag.element_start.offset(delta);
        elements.update(&drag.element_id, &TextElementPatch::position(target))
    }

    /// Global pointer up. Ends the drag and releases its subscription.
    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Topmost element under a container-local point. Later elements paint
    /// over earlier ones, so the search runs back to front.
    pub fn hit_test<'a>(
        &self,
        local: PixelPoint,
        container: &ContainerBounds,
        elements: &'a TextElements,
    ) -> Option<&'a str> {
        if !container.is_usable() {
            return None;
        }
        let aspect = container.width / container.height;
        elements
            .iter()
            .rev()
            .find(|el| el.bounds(aspect).contains_local(local, container))
            .map(|el| el.id.as_str())
    }

    pub fn update_element(&self, id: &str, patch: &TextElementPatch, elements: &mut TextElements) -> bool {
        elements.update(id, patch)
    }
}
