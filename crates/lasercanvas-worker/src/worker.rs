use std::collections::BTreeMap;

use lasercanvas_engine::expr::vocabulary::VARIABLE_NAMES;
use lasercanvas_engine::{VariableError, VariableStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::element::{Direction, ElementDef, ElementRegistry, ModePlane};
use crate::protocol::{decode, encode, ProtocolError, SystemSnapshot, WorkerMessage, WorkerReply};

/// The isolated side of the offload boundary.
///
/// Owns its own variable store, which starts with every variable at `0` and
/// only changes through `variables` messages.
#[derive(Debug)]
pub struct StabilityWorker {
    variables: VariableStore,
    registry: ElementRegistry,
}

impl Default for StabilityWorker {
    fn default() -> Self {
        Self {
            variables: VariableStore::new(VARIABLE_NAMES),
            registry: ElementRegistry::default(),
        }
    }
}

impl StabilityWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    /// Processes one message. `variables` messages produce no reply.
    pub fn handle(&mut self, message: WorkerMessage) -> Result<Option<WorkerReply>, ProtocolError> {
        match message {
            WorkerMessage::Init(defs) => Ok(Some(self.on_init(&defs))),
            WorkerMessage::System(snapshot) => self.on_system(&snapshot).map(Some),
            WorkerMessage::Variables(values) => {
                self.on_variables(&values)?;
                Ok(None)
            }
            WorkerMessage::Test => Ok(Some(WorkerReply::Pong)),
        }
    }

    /// Decodes and processes one JSON message. Failures never escape: they are
    /// logged and answered with [`WorkerReply::Rejected`].
    pub fn handle_json(&mut self, json: &str) -> Option<WorkerReply> {
        match decode::<WorkerMessage>(json).and_then(|message| self.handle(message)) {
            Ok(reply) => reply,
            Err(err) => {
                log::warn!("worker rejected message: {err}");
                Some(WorkerReply::Rejected {
                    reason: err.to_string(),
                })
            }
        }
    }

    fn on_init(&mut self, defs: &[ElementDef]) -> WorkerReply {
        let (registry, rejected) = ElementRegistry::from_definitions(defs);
        for err in rejected {
            log::warn!("skipping element definition: {err}");
        }
        self.registry = registry;
        let kinds = self.registry.kinds().collect::<Vec<_>>();
        log::debug!("worker registered {} element kind(s)", kinds.len());
        WorkerReply::Ready { kinds }
    }

    fn on_system(&self, snapshot: &SystemSnapshot) -> Result<WorkerReply, ProtocolError> {
        let first = snapshot.elements.first().ok_or(ProtocolError::EmptySystem)?;
        let element = self.registry.instantiate(first, &self.variables)?;
        let reply = WorkerReply::Abcd {
            element: element.name().to_string(),
            sagittal: element.abcd(Direction::Forward, ModePlane::Sagittal),
            tangential: element.abcd(Direction::Forward, ModePlane::Tangential),
        };
        log::debug!(
            "worker evaluated {} `{}` over {} element(s)",
            element.kind(),
            element.name(),
            snapshot.elements.len()
        );
        Ok(reply)
    }

    /// Applies all values or none.
    fn on_variables(&mut self, values: &BTreeMap<String, f64>) -> Result<(), VariableError> {
        if let Some(name) = values.keys().find(|name| !self.variables.contains(name)) {
            return Err(VariableError::Undeclared(name.clone()));
        }
        for (name, value) in values {
            self.variables.set(name, *value)?;
        }
        Ok(())
    }

    /// Moves the worker onto its own task and returns the host's handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> StabilityWorkerHandle {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(self, message_rx, reply_tx));
        StabilityWorkerHandle {
            messages: message_tx,
            replies: reply_rx,
            task,
        }
    }
}

async fn run(
    mut worker: StabilityWorker,
    mut messages: mpsc::UnboundedReceiver<String>,
    replies: mpsc::UnboundedSender<WorkerReply>,
) {
    while let Some(json) = messages.recv().await {
        let Some(reply) = worker.handle_json(&json) else {
            continue;
        };
        if replies.send(reply).is_err() {
            log::debug!("host dropped the reply channel; worker stopping");
            break;
        }
    }
}

/// Host side of a spawned [`StabilityWorker`].
///
/// Posting never waits for the worker. Replies arrive in message order and are
/// logged as they are received.
#[derive(Debug)]
pub struct StabilityWorkerHandle {
    messages: mpsc::UnboundedSender<String>,
    replies: mpsc::UnboundedReceiver<WorkerReply>,
    task: JoinHandle<()>,
}

impl StabilityWorkerHandle {
    pub fn post(&self, message: &WorkerMessage) -> Result<(), ProtocolError> {
        self.post_json(encode(message)?)
    }

    /// Sends already-encoded JSON, as a host in another process would.
    pub fn post_json(&self, json: String) -> Result<(), ProtocolError> {
        self.messages.send(json).map_err(|_| ProtocolError::Closed)
    }

    /// Registers every compiled element kind with the worker.
    pub fn init(&self) -> Result<(), ProtocolError> {
        self.post(&WorkerMessage::Init(ElementRegistry::builtin().definitions()))
    }

    pub fn set_system(&self, snapshot: SystemSnapshot) -> Result<(), ProtocolError> {
        self.post(&WorkerMessage::System(snapshot))
    }

    pub fn set_variables(&self, values: BTreeMap<String, f64>) -> Result<(), ProtocolError> {
        self.post(&WorkerMessage::Variables(values))
    }

    pub fn test(&self) -> Result<(), ProtocolError> {
        self.post(&WorkerMessage::Test)
    }

    /// Next reply, or `None` once the worker has stopped.
    pub async fn recv(&mut self) -> Option<WorkerReply> {
        let reply = self.replies.recv().await?;
        log_reply(&reply);
        Some(reply)
    }

    /// Closes the message channel, waits for the worker to drain it, and
    /// returns the replies not yet received.
    pub async fn shutdown(mut self) -> Vec<WorkerReply> {
        drop(self.messages);
        let mut pending = Vec::new();
        while let Some(reply) = self.replies.recv().await {
            log_reply(&reply);
            pending.push(reply);
        }
        if let Err(err) = self.task.await {
            log::warn!("stability worker task failed: {err}");
        }
        pending
    }
}

fn log_reply(reply: &WorkerReply) {
    match reply {
        WorkerReply::Ready { kinds } => log::info!("worker ready for {kinds:?}"),
        WorkerReply::Abcd {
            element,
            sagittal,
            tangential,
        } => log::info!("worker abcd for `{element}`: sagittal {sagittal}, tangential {tangential}"),
        WorkerReply::Pong => log::info!("worker pong"),
        WorkerReply::Rejected { reason } => log::info!("worker rejected a message: {reason}"),
    }
}
