// rdssnapshare/src/rds/tags.rs
// Tagging is addressed by ARN and is the same call for instance and cluster snapshots.
use aws_sdk_rds::Client;
use aws_sdk_rds::types::Tag;

use crate::errors::{Result, from_sdk};

pub(super) async fn list_tags(client: &Client, address: &str) -> Result<Vec<(String, String)>> {
    let output = client
        .list_tags_for_resource()
        .resource_name(address)
        .send()
        .await
        .map_err(|err| from_sdk("ListTagsForResource", address, err))?;

    Ok(output
        .tag_list()
        .iter()
        .filter_map(|tag| {
            let key = tag.key()?;
            Some((key.to_string(), tag.value().unwrap_or_default().to_string()))
        })
        .collect())
}

pub(super) async fn add_tags(client: &Client, address: &str, tags: &[(&str, &str)]) -> Result<()> {
    let tags = tags
        .iter()
        .map(|(key, value)| Tag::builder().key(*key).value(*value).build())
        .collect::<Vec<_>>();

    client
        .add_tags_to_resource()
        .resource_name(address)
        .set_tags(Some(tags))
        .send()
        .await
        .map_err(|err| from_sdk("AddTagsToResource", address, err))?;
    Ok(())
}
