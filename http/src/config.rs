// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;

/// Where the config endpoint listens. Read from `OFSLICER_HTTP_LISTEN` with
/// a hardcoded fallback, the same spirit as the teacher's
/// `get_conf_from_argv` reading argv with a default baked in.
#[derive(Debug, Clone, Copy)]
pub struct ListenConfig {
    pub addr: SocketAddr,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

impl ListenConfig {
    pub fn from_env() -> Self {
        match std::env::var("OFSLICER_HTTP_LISTEN") {
            Ok(v) => match v.parse() {
                Ok(addr) => Self { addr },
                Err(e) => {
                    log::warn!("OFSLICER_HTTP_LISTEN={v:?} is not a socket address ({e}), using default");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}
