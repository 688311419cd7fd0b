use std::path::PathBuf;
use std::sync::Arc;

use crab_printer::UsbSupport;

use crate::core::tasks::{BackgroundTasks, TaskHealth, TaskKind};
use crate::core::{Config, Result};
use crate::printing::{
    JobStore, PrintDispatcher, PrintExecutor, PrintSink, RedbJobStore, RestJobStore,
};
use crate::utils::logger::periodic_cleanup;

/// Agent state - shared handles to every service
///
/// Cheap to clone; handlers receive it through axum's `State`.
///
/// | Field | Description |
/// |-------|-------------|
/// | config | Agent configuration (immutable) |
/// | store | Job store (embedded redb or hosted table) |
/// | usb | Host USB capability, resolved once |
/// | dispatcher | Print dispatcher context |
/// | tasks | Background task states |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub store: Arc<dyn JobStore>,
    pub usb: UsbSupport,
    pub dispatcher: Arc<PrintDispatcher>,
    pub tasks: TaskHealth,
}

impl ServerState {
    /// Assemble state from parts
    ///
    /// Usually [`ServerState::initialize`]; tests pass their own store and sink.
    pub fn new(
        config: Config,
        store: Arc<dyn JobStore>,
        sink: Arc<dyn PrintSink>,
        usb: UsbSupport,
    ) -> Self {
        let dispatcher = Arc::new(PrintDispatcher::new(
            store.clone(),
            sink,
            config.agent_id.clone(),
            config.timezone,
            config.poll_interval(),
        ));
        Self {
            config,
            store,
            usb,
            dispatcher,
            tasks: TaskHealth::new(),
        }
    }

    /// Open the job store and build the print pipeline
    ///
    /// With `STORE_URL` unset the embedded store under `WORK_DIR` is used.
    pub async fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let store: Arc<dyn JobStore> = match &config.store {
            Some(endpoint) => {
                tracing::info!(url = %endpoint.url, table = %endpoint.jobs_table, "Using remote job store");
                Arc::new(RestJobStore::new(endpoint.clone())?)
            }
            None => {
                let path = config.database_path();
                tracing::info!(path = %path.display(), "Using embedded job store");
                Arc::new(RedbJobStore::open(path)?)
            }
        };

        let usb = UsbSupport::detect();
        let executor = PrintExecutor::new(usb.clone(), config.network_timeout());

        Ok(Self::new(config.clone(), store, Arc::new(executor), usb))
    }

    /// Start the dispatcher and housekeeping tasks
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new(self.tasks.clone());

        let dispatcher = self.dispatcher.clone();
        let token = tasks.shutdown_token();
        tasks.spawn("print_dispatcher", TaskKind::Worker, dispatcher.run(token));

        if let Some(dir) = &self.config.log_dir {
            let token = tasks.shutdown_token();
            tasks.spawn(
                "log_cleanup",
                TaskKind::Periodic,
                periodic_cleanup(PathBuf::from(dir), token),
            );
        }

        tracing::info!(count = tasks.len(), "Background tasks started");
        tasks
    }
}
