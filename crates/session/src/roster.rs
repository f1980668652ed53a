//! Roster synchronisation: friends and groups normalised into recipients.

use std::sync::Arc;

use bullhorn_config::GroupFetchMode;
use bullhorn_platform::{Friend, GroupInfo, PlatformHandle, ThreadKind};
use tracing::{debug, warn};

use crate::{Recipient, SessionResult};

impl Recipient {
    pub fn from_friend(friend: Friend) -> Self {
        Self {
            id: friend.user_id,
            display_name: friend.display_name,
            kind: ThreadKind::Individual,
            avatar_url: friend.avatar,
            member_count: None,
        }
    }

    pub fn from_group(group: GroupInfo) -> Self {
        Self {
            id: group.group_id,
            display_name: group.name,
            kind: ThreadKind::Group,
            avatar_url: group.avatar,
            member_count: group.member_count,
        }
    }
}

/// Fetch and normalise the full recipient roster. Friends come first, then
/// groups; source order is preserved within each kind. The caller swaps the
/// returned sequence into the session store wholesale.
pub async fn sync_roster(
    handle: &Arc<dyn PlatformHandle>,
    mode: GroupFetchMode,
) -> SessionResult<Vec<Recipient>> {
    let friends = handle.list_friends().await?;
    let mut roster: Vec<Recipient> = friends.into_iter().map(Recipient::from_friend).collect();

    let group_ids = handle.list_group_ids().await?;
    let groups = fetch_groups(handle, &group_ids, mode).await;
    debug!(
        friends = roster.len(),
        groups = groups.len(),
        requested_groups = group_ids.len(),
        "roster synchronised"
    );
    roster.extend(groups.into_iter().map(Recipient::from_group));

    Ok(roster)
}

async fn fetch_groups(
    handle: &Arc<dyn PlatformHandle>,
    group_ids: &[String],
    mode: GroupFetchMode,
) -> Vec<GroupInfo> {
    match mode {
        GroupFetchMode::Individual => {
            let mut groups = Vec::with_capacity(group_ids.len());
            for group_id in group_ids {
                match handle.group_details(std::slice::from_ref(group_id)).await {
                    Ok(details) => match details.into_iter().next() {
                        Some(group) => groups.push(group),
                        None => warn!(group_id, "no details returned for group, skipping"),
                    },
                    Err(err) => {
                        warn!(group_id, error = %err, "failed to resolve group, skipping");
                    }
                }
            }
            groups
        }
        GroupFetchMode::Batch => match handle.group_details(group_ids).await {
            Ok(groups) => groups,
            Err(err) => {
                warn!(error = %err, "batched group resolution failed, dropping all groups");
                Vec::new()
            }
        },
    }
}
