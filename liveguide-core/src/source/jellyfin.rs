use std::collections::HashMap;
use std::sync::Arc;

use actlet::prelude::*;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use itertools::Itertools;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::models::Artwork;
use crate::models::Channel;
use crate::models::Program;

use super::FetchChannels;
use super::FetchPrograms;

const TOKEN_HEADER: &str = "X-Emby-Token";

// Extra fields requested for every item.
const MINIMUM_FIELDS: &str = "MediaSources,Overview,ParentId,Taglines";

/// Fetches channels and programs from a Jellyfin-compatible media server.
pub struct JellyfinSource {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl JellyfinSource {
    pub fn new(config: Arc<Config>) -> Result<Self, Error> {
        // The transport owns the timeout.  The guide itself never applies one.
        let client = reqwest::Client::builder()
            .timeout(config.server.timeout)
            .build()?;
        Ok(JellyfinSource { config, client })
    }

    async fn fetch_items(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<BaseItem>, Error> {
        let url = self.config.server.endpoint(path)?;
        tracing::debug!(%url, ?query, "Fetching...");
        let mut req = self.client.get(url).query(query);
        if let Some(ref token) = self.config.server.access_token {
            req = req.header(TOKEN_HEADER, token);
        }
        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus(status));
        }
        let bytes = res.bytes().await?;
        let result: QueryResult = serde_json::from_slice(&bytes)?;
        Ok(result.items.unwrap_or_default())
    }
}

// actor

#[async_trait]
impl Actor for JellyfinSource {
    async fn started(&mut self, _ctx: &mut Context<Self>) {
        tracing::debug!(server.base_url = %self.config.server.base_url, "Started");
    }

    async fn stopped(&mut self, _ctx: &mut Context<Self>) {
        tracing::debug!("Stopped");
    }
}

// fetch channels

#[async_trait]
impl Handler<FetchChannels> for JellyfinSource {
    async fn handle(
        &mut self,
        msg: FetchChannels,
        _ctx: &mut Context<Self>,
    ) -> <FetchChannels as Message>::Reply {
        tracing::debug!(msg.name = "FetchChannels", %msg.session.user_id);
        let query = [
            ("userId", msg.session.user_id),
            ("sortBy", "Name".to_string()),
            ("sortOrder", "Ascending".to_string()),
            ("fields", MINIMUM_FIELDS.to_string()),
            ("enableUserData", "false".to_string()),
        ];
        let items = self.fetch_items("LiveTv/Channels", &query).await?;
        Ok(items
            .into_iter()
            .filter_map(BaseItem::into_channel)
            .collect())
    }
}

// fetch programs

#[async_trait]
impl Handler<FetchPrograms> for JellyfinSource {
    async fn handle(
        &mut self,
        msg: FetchPrograms,
        _ctx: &mut Context<Self>,
    ) -> <FetchPrograms as Message>::Reply {
        tracing::debug!(
            msg.name = "FetchPrograms",
            %msg.session.user_id,
            msg.channel_ids.len = msg.channel_ids.len(),
            %msg.window,
        );
        let query = [
            ("userId", msg.session.user_id),
            (
                "channelIds",
                msg.channel_ids.iter().map(|id| id.as_str()).join(","),
            ),
            ("minEndDate", format_datetime(msg.window.start)),
            ("maxStartDate", format_datetime(msg.window.end)),
            ("sortBy", "StartDate".to_string()),
            ("sortOrder", "Ascending".to_string()),
            ("fields", MINIMUM_FIELDS.to_string()),
            ("enableUserData", "false".to_string()),
        ];
        let items = self.fetch_items("LiveTv/Programs", &query).await?;
        Ok(items
            .into_iter()
            .filter_map(BaseItem::into_program)
            .collect())
    }
}

fn format_datetime(datetime: DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ServerConfig {
    /// Returns the URL of the primary image of an item.
    pub fn image_url(&self, artwork: &Artwork) -> Result<Url, Error> {
        let path = format!("Items/{}/Images/Primary", artwork.item_id);
        let mut url = self.endpoint(&path)?;
        url.query_pairs_mut()
            .append_pair("tag", &artwork.tag)
            .append_pair("maxWidth", &self.image_max_width.to_string());
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        // `Url::join()` replaces the last segment of a base URL which doesn't
        // end with a slash.
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(path)?)
    }
}

// models

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryResult {
    #[serde(default)]
    items: Option<Vec<BaseItem>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BaseItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    image_tags: Option<HashMap<String, String>>,
}

impl BaseItem {
    fn artwork(&self, id: &str) -> Option<Artwork> {
        let tag = self.image_tags.as_ref()?.get("Primary")?;
        Some(Artwork {
            item_id: id.to_string(),
            tag: tag.clone(),
        })
    }

    fn into_channel(self) -> Option<Channel> {
        let Some(id) = self.id.clone() else {
            tracing::warn!(item.name = ?self.name, "Channel without ID, skipped");
            return None;
        };
        let artwork = self.artwork(&id);
        Some(Channel {
            id: id.into(),
            name: self.name.unwrap_or_default(),
            number: self.number,
            artwork,
        })
    }

    fn into_program(self) -> Option<Program> {
        let Some(id) = self.id.clone() else {
            tracing::warn!(item.name = ?self.name, "Program without ID, skipped");
            return None;
        };
        let Some(channel_id) = self.channel_id.clone() else {
            tracing::warn!(program.id = %id, "Program without channel, skipped");
            return None;
        };
        let (Some(start_at), Some(end_at)) = (self.start_date, self.end_date) else {
            tracing::warn!(program.id = %id, "Program without airtime, skipped");
            return None;
        };
        if end_at < start_at {
            tracing::warn!(
                program.id = %id,
                %start_at,
                %end_at,
                "Program ends before it starts, skipped"
            );
            return None;
        }
        let artwork = self.artwork(&id);
        Some(Program {
            id: id.into(),
            channel_id: channel_id.into(),
            title: self.name.unwrap_or_default(),
            start_at,
            end_at,
            artwork,
        })
    }
}

// </coverage:exclude>
