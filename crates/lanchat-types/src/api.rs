use serde::{Deserialize, Deserializer, Serialize};

// -- Gateway handshake --

/// Query parameters on the `/gateway` upgrade request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HandshakeParams {
    /// Room to enter; absent or `"public"` means the public lobby.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub chat_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub private: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub pass: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub pass_need: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub creating: Option<String>,
}

impl HandshakeParams {
    pub fn is_creating(&self) -> bool {
        self.creating.as_deref() == Some("1")
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// -- Rooms --

#[derive(Debug, Deserialize)]
pub struct CheckRoomQuery {
    /// A missing id simply does not exist.
    #[serde(rename = "roomId", default)]
    pub room_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRoomResponse {
    pub exists: bool,
    #[serde(rename = "needPassword")]
    pub need_password: bool,
}

// -- Uploads --

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub path: String,
}
