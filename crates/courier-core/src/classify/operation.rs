//! Business-operation overlays on top of the base friendly mapping.

use super::{FriendlyError, ResourceKind, friendly};
use crate::transport::TransportError;

/// Title/action replacement for one named operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationOverlay {
    pub operation: &'static str,
    pub title: &'static str,
    pub action: Option<&'static str>,
}

const OVERLAYS: &[OperationOverlay] = &[
    OperationOverlay {
        operation: "save-zones",
        title: "Failed to Save",
        action: Some("Your zones are still on screen. Try saving again."),
    },
    OperationOverlay {
        operation: "save-lesson",
        title: "Failed to Save Lesson",
        action: None,
    },
    OperationOverlay {
        operation: "delete-farm",
        title: "Failed to Delete",
        action: Some("Refresh the page to see whether the farm was removed."),
    },
    OperationOverlay {
        operation: "submit-practice",
        title: "Practice Not Submitted",
        action: Some("Your answers are kept. Submit again when you're ready."),
    },
    OperationOverlay {
        operation: "upload-image",
        title: "Upload Failed",
        action: None,
    },
    OperationOverlay {
        operation: "post-comment",
        title: "Comment Not Posted",
        action: None,
    },
];

pub fn overlay_for(operation: &str) -> Option<&'static OperationOverlay> {
    OVERLAYS.iter().find(|o| o.operation == operation)
}

/// Base mapping, then the operation's title/action if one is registered.
///
/// Session and permission problems keep their base title: "Session Expired"
/// says more than "Failed to Save". `retryable` is never changed.
pub fn friendly_for_operation(
    error: &TransportError,
    operation: &str,
    resource: Option<ResourceKind>,
) -> FriendlyError {
    let mut base = friendly(error, resource);
    let keeps_base_title = matches!(error.status(), Some(401) | Some(403));

    if let Some(overlay) = overlay_for(operation)
        && !keeps_base_title
    {
        base.title = overlay.title.to_string();
        if let Some(action) = overlay.action {
            base.action = action.to_string();
        }
    }
    base
}
