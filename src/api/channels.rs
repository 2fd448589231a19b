//! Channel procedures. Nothing is persisted yet: `list` is always empty and
//! `add` only echoes the id back.

use serde::{Deserialize, Serialize};

use crate::api::procedures::{CHANNELS_ADD, CHANNELS_LIST};
use crate::api::rpc::{respond, Input, RpcResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub channel_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelList {
    pub channels: Vec<Channel>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAdded {
    pub success: bool,
    pub channel_id: String,
}

pub async fn list() -> RpcResult<ChannelList> {
    respond(CHANNELS_LIST, Ok(ChannelList { channels: Vec::new() }))
}

#[tracing::instrument(name = "channels.add")]
pub async fn add(Input(channel): Input<Channel>) -> RpcResult<ChannelAdded> {
    tracing::info!(channel_id = %channel.channel_id, "Channel acknowledged, not persisted");
    respond(
        CHANNELS_ADD,
        Ok(ChannelAdded {
            success: true,
            channel_id: channel.channel_id,
        }),
    )
}
