//! Commands sent from the host to the bridge.
//!
//! Commands follow `module.methodName` format.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | `tabs.get` | Resolve a tab's current address and title |
//! | `action.setBadgeText` | Mirror the working-set counter on the toolbar badge |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::TabId;

// ============================================================================
// Command
// ============================================================================

/// Bridge commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    /// Look up a tab.
    #[serde(rename = "tabs.get")]
    TabsGet {
        /// Tab to resolve.
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },

    /// Set the toolbar badge text (empty string hides it).
    #[serde(rename = "action.setBadgeText")]
    SetBadgeText {
        /// Badge text.
        text: String,
    },
}

// ============================================================================
// Tests
// ============================================================================
