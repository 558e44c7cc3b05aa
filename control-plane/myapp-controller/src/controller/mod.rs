use std::sync::Arc;

use futures_util::StreamExt;
use kube::{
    Api, Client,
    runtime::{
        Controller,
        controller::{self, Action},
        watcher::Config,
    },
};
use tracing::{error, info, warn};

use crate::config::ControllerConfig;
use crate::crd::my_app::MyApp;
use crate::store::StoreError;

pub mod mutate;
pub mod owner;
pub mod reconcile;
pub mod watch;

pub use owner::OwnershipError;
pub use reconcile::{OperationResult, ReconcileOutcome, Reconciler};


#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    /// Fetch/create/replace failure, including a conflict that survived the
    /// in-process retry. The scheduler retries these with backoff.
    #[error("{kind} {key}: {source}")]
    Store {
        kind: String,
        key: String,
        #[source]
        source: StoreError,
    },
    /// Child is controlled by someone else; retrying cannot fix it.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
    /// Adopted Deployment has an immutable selector the pod template labels
    /// no longer satisfy.
    #[error("Deployment {key}: selector {selector} does not match template labels")]
    SelectorMismatch { key: String, selector: String },
}

impl ReconcileErr {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileErr::Store { .. })
    }
}

pub(crate) fn store_err(
    kind: &str,
    ns: &str,
    name: &str,
) -> impl FnOnce(StoreError) -> ReconcileErr {
    let kind = kind.to_string();
    let key = format!("{}/{}", ns, name);
    move |source| ReconcileErr::Store { kind, key, source }
}

pub struct ControllerContext {
    pub reconciler: Reconciler,
    pub cfg: ControllerConfig,
}

pub async fn run_controller(
    client: Client,
    cfg: ControllerConfig,
) -> anyhow::Result<()> {
    let apps: Api<MyApp> = match cfg.watch_namespace.as_deref() {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    let ctx = Arc::new(ControllerContext {
        reconciler: Reconciler::from_client(client.clone(), &cfg.field_manager),
        cfg: cfg.clone(),
    });

    let controller = Controller::new(apps, Config::default()).with_config(
        controller::Config::default().concurrency(cfg.concurrency),
    );
    watch::register(controller, client, cfg.watch_namespace.as_deref())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    info!(%obj_ref, ?action, "reconciled")
                }
                Err(e) => warn!(error = %e, "reconcile failed"),
            }
        })
        .await;

    info!("controller terminated");
    Ok(())
}

async fn reconcile(
    obj: Arc<MyApp>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileErr> {
    let key = watch::parent_key(&obj);
    ctx.reconciler.reconcile(&key).await?;
    Ok(next_action(&ctx.cfg))
}

fn next_action(cfg: &ControllerConfig) -> Action {
    match cfg.resync() {
        Some(every) => Action::requeue(every),
        None => Action::await_change(),
    }
}

fn error_policy(
    obj: Arc<MyApp>,
    err: &ReconcileErr,
    ctx: Arc<ControllerContext>,
) -> Action {
    let key = watch::parent_key(&obj);
    if err.is_retryable() {
        warn!(%key, error = %err, "reconcile: transient failure; requeueing");
        Action::requeue(ctx.cfg.error_requeue())
    } else {
        // No requeue: only a change to the parent or a child can fix this.
        error!(%key, error = %err, "reconcile: non-retryable failure");
        Action::await_change()
    }
}
