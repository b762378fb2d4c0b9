//! Scrollable-node lookup over a host accessibility tree.
//!
//! Gesture synthesis is currently geometry-based, so nothing on the dispatch
//! path consumes this; it exists so a host integration can target gestures
//! at a specific scrollable region instead of screen-relative coordinates.

/// Action identifier a node declares when it can scroll its content forward.
pub const ACTION_SCROLL_FORWARD: u32 = 0x1000;
/// Action identifier a node declares when it can scroll its content backward.
pub const ACTION_SCROLL_BACKWARD: u32 = 0x2000;

/// A node of the host accessibility tree.
pub trait UiNode {
    /// Action identifiers this node declares support for.
    fn actions(&self) -> &[u32];
    fn child_count(&self) -> usize;
    fn child(&self, index: usize) -> Option<&Self>;
}

/// Finds the first node that declares a scroll action.
///
/// Pre-order depth-first: the node itself is tested before its children, and
/// the first match anywhere in a subtree ends the search. Returns `None` for
/// an absent root or a tree with no scrollable node.
pub fn find_scrollable<N: UiNode>(root: Option<&N>) -> Option<&N> {
    let node = root?;
    if node
        .actions()
        .iter()
        .any(|&a| a == ACTION_SCROLL_FORWARD || a == ACTION_SCROLL_BACKWARD)
    {
        return Some(node);
    }
    for index in 0..node.child_count() {
        if let Some(found) = find_scrollable(node.child(index)) {
            return Some(found);
        }
    }
    None
}
