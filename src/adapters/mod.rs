//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements          | Connects to                   |
//! |-----------------|---------------------|-------------------------------|
//! | `file_store`    | StoragePort         | postcard map file / HashMap   |
//! | `probe`         | ConnectivityPort    | TCP connect to `host:port`    |
//! | `command_inbox` | CommandSourcePort   | JSON pending-command slot     |
//! | `spool`         | WorkQueuePort       | pending/outbox/synced dirs    |
//! | `log_sink`      | EventSink           | `log` facade                  |
//! | `time`          | —                   | system wall clock (epoch ms)  |
//!
//! [`HostPorts`] bundles the four driven adapters into the single value
//! the [`Runtime`](crate::app::runtime::Runtime) is generic over.

pub mod command_inbox;
pub mod file_store;
pub mod log_sink;
pub mod probe;
pub mod spool;
pub mod time;

use std::path::Path;

use crate::app::ports::{
    CommandSourcePort, ConnectivityPort, StoragePort, WorkItem, WorkQueuePort,
};
use crate::command::CommandMessage;
use crate::config::FallbackConfig;
use crate::error::{CommandSourceError, ProbeError, StorageError, WorkError};

use command_inbox::CommandInbox;
use file_store::FileStore;
use probe::TcpProbe;
use spool::SpoolQueue;

pub const STATE_FILE: &str = "state.bin";
pub const INBOX_FILE: &str = "pending_command.json";
pub const SPOOL_DIR: &str = "spool";

/// Host-side port bundle rooted at `data_dir`.
pub struct HostPorts {
    pub store: FileStore,
    pub probe: TcpProbe,
    pub inbox: CommandInbox,
    pub spool: SpoolQueue,
}

impl HostPorts {
    pub fn open(cfg: &FallbackConfig) -> Result<Self, StorageError> {
        let root = Path::new(&cfg.data_dir);
        Ok(Self {
            store: FileStore::open(root.join(STATE_FILE))?,
            probe: TcpProbe::new(cfg.probe_host.clone(), cfg.probe_timeout_ms),
            inbox: CommandInbox::new(root.join(INBOX_FILE)),
            spool: SpoolQueue::new(root.join(SPOOL_DIR)),
        })
    }
}

impl StoragePort for HostPorts {
    fn get_number(&self, key: &str) -> Result<Option<u64>, StorageError> {
        self.store.get_number(key)
    }

    fn set_number(&mut self, key: &str, value: u64) -> Result<(), StorageError> {
        self.store.set_number(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.store.remove(key)
    }
}

impl ConnectivityPort for HostPorts {
    fn probe_now(&mut self) -> Result<bool, ProbeError> {
        self.probe.probe_now()
    }
}

impl CommandSourcePort for HostPorts {
    fn fetch_pending_command(&mut self) -> Result<Option<CommandMessage>, CommandSourceError> {
        self.inbox.fetch_pending_command()
    }
}

impl WorkQueuePort for HostPorts {
    fn pending_items(&mut self) -> Result<Vec<WorkItem>, WorkError> {
        self.spool.pending_items()
    }

    fn sync_item(&mut self, item: &WorkItem) -> Result<(), WorkError> {
        self.spool.sync_item(item)
    }

    fn commit(&mut self, items: &[WorkItem]) -> Result<(), WorkError> {
        self.spool.commit(items)
    }
}
