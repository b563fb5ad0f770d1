// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcProtocol {
    Http,
    Https,
    Ws,
    Wss,
}

impl RpcProtocol {
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(RpcProtocol::Http),
            "https" => Some(RpcProtocol::Https),
            "ws" => Some(RpcProtocol::Ws),
            "wss" => Some(RpcProtocol::Wss),
            _ => None,
        }
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self, RpcProtocol::Ws | RpcProtocol::Wss)
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, RpcProtocol::Https | RpcProtocol::Wss)
    }
}

/// A validated node endpoint. Both transports are derivable from one url so a chain only needs
/// to be configured once.
#[derive(Clone, Debug)]
pub struct RPC {
    protocol: RpcProtocol,
    url: Url,
}

impl RPC {
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).context("Invalid URL format")?;
        let Some(protocol) = RpcProtocol::from_scheme(parsed.scheme()) else {
            bail!("Invalid protocol. Expected: http://, https://, ws://, wss://");
        };

        if parsed.host_str().is_none() {
            bail!("URL must contain a host");
        }

        Ok(RPC {
            protocol,
            url: parsed,
        })
    }

    pub fn protocol(&self) -> RpcProtocol {
        self.protocol
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn as_http_url(&self) -> Result<String> {
        let scheme = if self.protocol.is_secure() {
            "https"
        } else {
            "http"
        };
        self.with_scheme(scheme)
    }

    pub fn as_ws_url(&self) -> Result<String> {
        let scheme = if self.protocol.is_secure() { "wss" } else { "ws" };
        self.with_scheme(scheme)
    }

    fn with_scheme(&self, scheme: &str) -> Result<String> {
        if self.url.scheme() == scheme {
            return Ok(self.url.to_string());
        }
        let mut parsed = self.url.clone();
        parsed
            .set_scheme(scheme)
            .map_err(|_| anyhow!("{scheme} is not a valid scheme for {}", self.url))?;
        Ok(parsed.to_string())
    }

    pub fn is_websocket(&self) -> bool {
        self.protocol.is_websocket()
    }

    pub fn is_secure(&self) -> bool {
        self.protocol.is_secure()
    }

    pub fn is_local(&self) -> bool {
        match self.hostname() {
            "localhost" | "127.0.0.1" | "::1" | "[::1]" => true,
            host => host.starts_with("127."),
        }
    }
}

#[derive(Debug, Hash, Eq, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(tag = "type", content = "credentials")]
pub enum RpcAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer(String),
}
