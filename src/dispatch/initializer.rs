use tracing::{error, info};

use crate::dispatch::error::DispatchError;
use crate::store::{GroupStatus, StreamStore};

/// Ensure `group` exists on every stream, in order
///
/// "Already exists" counts as success. The first other failure is returned
/// and no further streams are touched; the caller must not start dispatching.
pub async fn initialize_groups<S>(
    store: &S,
    streams: &[String],
    group: &str,
) -> Result<Vec<(String, GroupStatus)>, DispatchError>
where
    S: StreamStore + ?Sized,
{
    let mut statuses = Vec::with_capacity(streams.len());

    for stream in streams {
        match store.ensure_group(stream, group).await {
            Ok(GroupStatus::Created) => {
                info!(stream = %stream, group = %group, "Consumer group created");
                statuses.push((stream.clone(), GroupStatus::Created));
            }
            Ok(GroupStatus::AlreadyExists) => {
                info!(
                    stream = %stream,
                    group = %group,
                    "Consumer group already exists, skipping creation"
                );
                statuses.push((stream.clone(), GroupStatus::AlreadyExists));
            }
            Err(source) => {
                error!(stream = %stream, group = %group, error = %source, "Error creating consumer group");
                return Err(DispatchError::GroupInit {
                    stream: stream.clone(),
                    group: group.to_string(),
                    source,
                });
            }
        }
    }

    Ok(statuses)
}
