//! Startup orchestration: opens shared resources in dependency order,
//! registers the long-lived tasks, and tears everything down on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use currawong_task::{ChildTask, ShutdownHandle, ShutdownSignal, Task};
use notify_broker::amqp::AmqpBroker;
use notify_broker::memory::{self, EnvelopeReceiver, MemoryBroker};
use notify_broker::{Broker as _, DynBroker, HandlerRegistry};

use crate::auth::new_certificate_cache;
use crate::azure::{self, TokenFetchArgs};
use crate::config::ConfHandle;
use crate::notify::transmit::{CheckChangesHandler, TransmitHandler};
use crate::notify::NotificationHandle;
use crate::{store, ServerState};

pub struct Tasks {
    inner: Vec<ChildTask<anyhow::Result<()>>>,
    pub shutdown_handle: ShutdownHandle,
    shutdown_signal: ShutdownSignal,
}

impl Tasks {
    fn new() -> Self {
        let (shutdown_handle, shutdown_signal) = ShutdownHandle::new();
        Self {
            inner: Vec::new(),
            shutdown_handle,
            shutdown_signal,
        }
    }

    fn register<T>(&mut self, task: T)
    where
        T: Task<Output = anyhow::Result<()>> + 'static,
    {
        let child = currawong_task::spawn_task(task, self.shutdown_signal.clone());
        self.inner.push(child);
    }
}

/// Wires everything up and returns the running task set.
pub async fn spawn_tasks(conf_handle: ConfHandle) -> anyhow::Result<Tasks> {
    let conf = conf_handle.get_conf();
    let mut tasks = Tasks::new();

    // Database first; with Azure managed identity the password is a minted
    // token and connections are recycled before the next rotation.
    let pool = match conf.azure_ad.as_ref().and_then(|azure| {
        azure
            .db_resource_id
            .clone()
            .map(|resource_id| (azure.clone(), resource_id))
    }) {
        Some((azure, resource_id)) => {
            let client = reqwest::Client::builder()
                .timeout(azure::METADATA_HTTP_TIMEOUT)
                .build()
                .context("build metadata HTTP client")?;
            let token_cache = azure::new_token_cache();
            let args = TokenFetchArgs {
                client,
                resource_id,
                client_id: azure.client_id.clone(),
            };

            let database_url =
                azure::database_url_with_token(&conf.database_url, &token_cache, args.clone()).await?;
            let pool = store::connect_with_recycling(&database_url, azure.db_refresh_secs).await?;

            tasks.register(azure::TokenRefreshTask {
                token_cache,
                args,
                refresh_secs: azure.db_refresh_secs,
                jwks: Some((azure::new_jwks_cache(), azure.tenant_id.clone())),
            });

            pool
        }
        None => store::connect(&conf.database_url).await?,
    };

    let cert_cache = new_certificate_cache();

    // The broker: AMQP when a URL is configured, in-process otherwise. The
    // worker side runs in this process either way.
    let notifications = if conf.enable_notifications {
        let (broker, worker): (DynBroker, WorkerKind) = match &conf.rabbit_mq_broker_url {
            Some(url) => {
                let broker = Arc::new(AmqpBroker::new(url.clone()));
                broker.startup().await.context("start AMQP broker")?;
                (broker, WorkerKind::Amqp { url: url.clone() })
            }
            None => {
                let (broker, rx) = MemoryBroker::new();
                (Arc::new(broker), WorkerKind::Memory { rx })
            }
        };

        let registry = Arc::new(
            HandlerRegistry::new()
                .register(Arc::new(CheckChangesHandler {
                    pool: pool.clone(),
                    broker: Arc::clone(&broker),
                    conf_handle: conf_handle.clone(),
                }))
                .register(Arc::new(
                    TransmitHandler::new(pool.clone(), Arc::clone(&broker))
                        .context("build transmit handler")?,
                )),
        );

        match worker {
            WorkerKind::Memory { rx } => tasks.register(MemoryWorkerTask { rx, registry }),
            WorkerKind::Amqp { url } => tasks.register(AmqpWorkerTask { url, registry }),
        }

        NotificationHandle::new(broker)
    } else {
        NotificationHandle::disabled()
    };

    let state = ServerState {
        conf_handle: conf_handle.clone(),
        pool,
        cert_cache,
        notifications,
    };

    let listener = tokio::net::TcpListener::bind(&conf.listen_addr)
        .await
        .with_context(|| format!("bind {}", conf.listen_addr))?;
    info!(listen_addr = %conf.listen_addr, "Listening");

    tasks.register(HttpServerTask { listener, state });

    Ok(tasks)
}

enum WorkerKind {
    Memory { rx: EnvelopeReceiver },
    Amqp { url: String },
}

struct HttpServerTask {
    listener: tokio::net::TcpListener,
    state: ServerState,
}

#[async_trait]
impl Task for HttpServerTask {
    type Output = anyhow::Result<()>;

    const NAME: &'static str = "http server";

    async fn run(self, mut shutdown_signal: ShutdownSignal) -> Self::Output {
        let router = axum::Router::new()
            .merge(crate::api::make_unsecured_router().with_state(self.state.clone()))
            .nest("/admin", crate::admin::make_router(self.state.clone()))
            .merge(crate::api::make_router(self.state))
            .layer(tower_http::trace::TraceLayer::new_for_http());

        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move { shutdown_signal.wait().await })
            .await
            .context("HTTP server failure")
    }
}

struct MemoryWorkerTask {
    rx: EnvelopeReceiver,
    registry: Arc<HandlerRegistry>,
}

#[async_trait]
impl Task for MemoryWorkerTask {
    type Output = anyhow::Result<()>;

    const NAME: &'static str = "notification worker";

    async fn run(self, mut shutdown_signal: ShutdownSignal) -> Self::Output {
        debug!("Task started");
        tokio::select! {
            () = memory::run_worker(self.rx, self.registry) => {}
            () = shutdown_signal.wait() => {}
        }
        debug!("Task terminated");
        Ok(())
    }
}

struct AmqpWorkerTask {
    url: String,
    registry: Arc<HandlerRegistry>,
}

#[async_trait]
impl Task for AmqpWorkerTask {
    type Output = anyhow::Result<()>;

    const NAME: &'static str = "notification worker";

    async fn run(self, mut shutdown_signal: ShutdownSignal) -> Self::Output {
        debug!("Task started");

        // The consumer reconnects on failure; the broker owns durability.
        loop {
            tokio::select! {
                result = notify_broker::amqp::run_consumer(&self.url, Arc::clone(&self.registry)) => {
                    match result {
                        Ok(()) => break,
                        Err(error) => {
                            warn!(error = format!("{error:#}"), "AMQP consumer failed; reconnecting");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
                () = shutdown_signal.wait() => break,
            }
        }

        debug!("Task terminated");
        Ok(())
    }
}

/// Runs until every task completes or a shutdown signal is requested via
/// ctrl-c.
pub async fn run(conf_handle: ConfHandle) -> anyhow::Result<()> {
    let Tasks {
        inner,
        shutdown_handle,
        shutdown_signal,
    } = spawn_tasks(conf_handle).await?;

    // Only the spawned tasks may hold signals, or `all_closed` never fires.
    drop(shutdown_signal);

    let mut join_all = futures::future::select_all(inner.into_iter().map(|child| Box::pin(child.join())));

    loop {
        tokio::select! {
            result = &mut join_all => {
                let (result, _, rest) = result;
                match result {
                    Ok(Ok(())) => trace!("A task terminated gracefully"),
                    Ok(Err(error)) => error!(error = format!("{error:#}"), "A task failed"),
                    Err(error) => error!(%error, "Something went very wrong with a task"),
                }

                if rest.is_empty() {
                    break;
                }
                join_all = futures::future::select_all(rest);
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    error!(%error, "Failed to listen for shutdown signal");
                }
                info!("Shutdown requested");
                shutdown_handle.signal();

                tokio::select! {
                    () = shutdown_handle.all_closed() => debug!("All tasks closed gracefully"),
                    () = tokio::time::sleep(Duration::from_secs(10)) => {
                        warn!("Some tasks didn’t terminate in time");
                    }
                }
                break;
            }
        }
    }

    Ok(())
}
