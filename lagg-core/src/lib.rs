//! Core library for redundant link aggregation.
//!
//! Traffic for one destination is duplicated across several independent
//! physical links and reassembled at the far end from whichever copy of each
//! frame arrives first. Duplicates are dropped, frames are delivered strictly
//! in sequence order, and a reorder timeout bounds how long a lost frame can
//! hold back the ones behind it.
//!
//! # Architecture
//!
//! - `seq`: 16-bit wrapping sequence arithmetic
//! - `proto`: Frame header and hardware addresses
//! - `link`: Raw `AF_PACKET` socket per physical path
//! - `reorder`: Deduplication and in-order delivery with timed gap skipping
//! - `manager`: Redundant send and the link reception worker
//! - `aggregator`: Poll loop joining a [`Client`] to the [`LinkManager`]
//! - `client`: Local packet endpoint, with a TUN implementation
//! - `config`: `key=value` configuration file
//! - `notify`, `queue`, `worker`, `timer`: Threading primitives
//!
//! # Platform
//!
//! Linux only.
//!
//! # Example
//!
//! ```no_run
//! # fn example() -> anyhow::Result<()> {
//! use lagg_core::{Aggregator, AggregatorConfig, Link, LinkManager, TunClient};
//!
//! let cfg = AggregatorConfig::from_file("lagg.conf".as_ref())?;
//! let links = cfg
//!     .links
//!     .iter()
//!     .map(|l| Link::open(&l.if_name, l.peer))
//!     .collect::<Result<Vec<_>, _>>()?;
//! let manager = LinkManager::new(links, cfg.reorder_timeout)?;
//! let client = TunClient::new(&cfg.tun_name, cfg.tun_mtu)?;
//!
//! let mut aggregator = Aggregator::new(client, manager, cfg.destination_ip, cfg.health_interval)?;
//! aggregator.log_setup();
//! aggregator.run()?;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod client;
pub mod config;
pub mod link;
pub mod manager;
pub mod notify;
pub mod proto;
pub mod queue;
pub mod reorder;
pub mod seq;
pub mod timer;
pub mod worker;

pub use aggregator::{Aggregator, ShutdownHandle};
pub use client::{Client, TunClient};
pub use config::{AggregatorConfig, ConfigError, LinkConfig};
pub use link::{Link, LinkError};
pub use manager::{LinkManager, ManagerError};
pub use proto::{FrameHeader, MacAddress, ProtoError};
pub use reorder::{ReorderEngine, ReorderStats};
