use chrono::{DateTime, Utc};
use member_types::{Member, StateRef, TransactionId};
use serde::{Deserialize, Serialize};

/// Proof that a transition was ordered and committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityReceipt {
    pub tx_id: TransactionId,
    pub consumed: Vec<StateRef>,
    pub produced: Vec<StateRef>,
    pub committed_at: DateTime<Utc>,
}

/// Filter over unconsumed members.
///
/// `title` matches exactly; `first_name` and `last_name` match as substrings.
/// Unset fields match everything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberQuery {
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl MemberQuery {
    pub fn matches(&self, member: &Member) -> bool {
        let title_match = match non_empty(&self.title) {
            Some(title) => member.title == title,
            None => true,
        };
        let first_match = match non_empty(&self.first_name) {
            Some(first) => member.first_name.contains(first),
            None => true,
        };
        let last_match = match non_empty(&self.last_name) {
            Some(last) => member.last_name.contains(last),
            None => true,
        };
        title_match && first_match && last_match
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
