//! Framework selection module.
//!
//! This module defines the two model families the explainers understand and
//! the ordered registry the dispatcher consults to pick a gradient backend.
//!
//! # Supported Frameworks
//!
//! - `ChannelsFirst`: models consuming `N×C×H×W` inputs, with an evaluation-mode toggle.
//! - `ChannelsLast`: models consuming `N×H×W×C` inputs, used as-is.
//!
//! A framework is *available* when its cargo feature (`channels-first`,
//! `channels-last`) is enabled. The process-wide registry is resolved once,
//! either from the available frameworks or from an explicit
//! [`Frameworks::install`] call made before the first explanation.

use core::convert::TryFrom;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ops::cpu::Layout;

/// Enumeration of supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Framework {
    /// Channel-first models (`N×C×H×W`), put in evaluation mode before explaining.
    ChannelsFirst = 0,
    /// Channel-last models (`N×H×W×C`).
    ChannelsLast,
}

impl Framework {
    /// Activation layout models of this family consume.
    pub const fn layout(self) -> Layout {
        match self {
            Self::ChannelsFirst => Layout::Nchw,
            Self::ChannelsLast => Layout::Nhwc,
        }
    }

    /// Whether the framework was compiled in.
    pub const fn is_available(self) -> bool {
        match self {
            Self::ChannelsFirst => cfg!(feature = "channels-first"),
            Self::ChannelsLast => cfg!(feature = "channels-last"),
        }
    }
}

impl TryFrom<u8> for Framework {
    type Error = ();

    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ChannelsFirst),
            1 => Ok(Self::ChannelsLast),
            _ => Err(()),
        }
    }
}

/// Ordered set of enabled frameworks; earlier entries win during dispatch.
///
/// Serializes as the list of framework names. Deserializing goes through
/// [`Frameworks::with_order`], so duplicates and missing frameworks are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Framework>", into = "Vec<Framework>")]
pub struct Frameworks {
    order: Vec<Framework>,
}

impl TryFrom<Vec<Framework>> for Frameworks {
    type Error = Error;

    fn try_from(order: Vec<Framework>) -> Result<Self> {
        Self::with_order(order)
    }
}

impl From<Frameworks> for Vec<Framework> {
    fn from(frameworks: Frameworks) -> Self {
        frameworks.order
    }
}

static GLOBAL_FRAMEWORKS: OnceLock<Frameworks> = OnceLock::new();

impl Frameworks {
    /// Every compiled-in framework, channels-first checked before channels-last.
    pub fn available() -> Self {
        Self {
            order: [Framework::ChannelsFirst, Framework::ChannelsLast]
                .into_iter()
                .filter(|fw| fw.is_available())
                .collect(),
        }
    }

    /// A registry with an explicit priority order.
    ///
    /// # Errors
    /// Fails if a framework is listed twice or was not compiled in.
    pub fn with_order(order: impl IntoIterator<Item = Framework>) -> Result<Self> {
        let mut seen = Vec::new();
        for fw in order {
            if !fw.is_available() {
                return Err(Error::InvalidArgument(format!(
                    "framework {fw:?} is not compiled in"
                )));
            }
            if seen.contains(&fw) {
                return Err(Error::InvalidArgument(format!(
                    "framework {fw:?} listed twice"
                )));
            }
            seen.push(fw);
        }
        Ok(Self { order: seen })
    }

    /// Enabled frameworks in priority order.
    pub fn iter(&self) -> impl Iterator<Item = Framework> + '_ {
        self.order.iter().copied()
    }

    /// Whether `fw` is enabled.
    pub fn contains(&self, fw: Framework) -> bool {
        self.order.contains(&fw)
    }

    /// Installs the process-wide registry.
    ///
    /// # Errors
    /// Fails if the registry was already resolved, explicitly or by a prior explanation.
    pub fn install(self) -> Result<()> {
        GLOBAL_FRAMEWORKS.set(self).map_err(|_| {
            Error::InvalidArgument("framework registry already resolved".to_string())
        })
    }

    /// The process-wide registry, resolved from [`Frameworks::available`] on first use.
    pub fn global() -> &'static Self {
        GLOBAL_FRAMEWORKS.get_or_init(Self::available)
    }
}

impl Default for Frameworks {
    fn default() -> Self {
        Self::available()
    }
}
