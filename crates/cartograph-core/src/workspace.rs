//! The workspace context: one owned object wiring every component together.
//!
//! A [`Workspace`] owns the feature store, the reconciler, the drag
//! controller, the layer manager, the persistence sync, and the render
//! surface. All mutation happens on the task that owns it; the only
//! suspension points are the remote calls, which run as spawned tasks and
//! report back through a completion channel.
//!
//! # Pipeline
//!
//! ```text
//! command -> reconciler / drag / store -> StoreChange
//!     StoreChange -> render surface adapter
//!                 -> reconciler / drag bookkeeping
//!                 -> persistence sync -> spawned remote write
//! completion -> persistence sync -> store acknowledgement / notice
//! ```
//!
//! # Lifecycle
//!
//! Activation is driven by the identity watch. Signing in clears the store,
//! starts a scoped load, and queues store-bound commands until it finishes.
//! Signing out (or switching users) bumps the sync generation, so a load or
//! write still in flight for the old session is discarded on arrival.

use std::collections::VecDeque;
use std::sync::Arc;

use cartograph_types::{
    BoundingBox, Coordinate, Feature, FeatureId, FeaturePatch, FeatureRecord, Geometry, Layer,
    LayerId, NewFeature, Notice, RenderCommand, StoreChange, SurfaceEvent, UploadOutcome, UserId,
    WorkspaceKind,
};
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::{CartographConfig, MapConfig};
use crate::drag::MarkerDragController;
use crate::error::{ValidationError, WorkspaceError};
use crate::layers::{LayerManager, UploadFile, UploadReport};
use crate::reconciler::{DrawEventReconciler, Reconciled};
use crate::remote::{RemoteError, RemoteFeatureStore};
use crate::store::FeatureStore;
use crate::surface::{RenderSurface, apply_change};
use crate::sync::{PersistenceSync, WriteCompletion, WriteOutcome, WriteRequest};

/// A user or surface action for the workspace.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// An edit event from the render surface.
    Surface(SurfaceEvent),
    /// Add a marker, at the map center when no coordinate is given.
    AddMarker {
        /// Where to place the marker.
        coordinate: Option<Coordinate>,
    },
    /// Append a point to the path.
    AddPathPoint {
        /// The new point.
        coordinate: Coordinate,
    },
    /// Remove a point from the path.
    RemovePathPoint {
        /// Position of the point.
        index: usize,
    },
    /// Change a feature's label.
    Rename {
        /// The feature.
        id: FeatureId,
        /// The new label.
        name: String,
    },
    /// Delete a feature.
    Delete {
        /// The feature.
        id: FeatureId,
    },
    /// Fit the viewport to a feature.
    Focus {
        /// The feature.
        id: FeatureId,
    },
    /// Upload dataset files as layers.
    Upload {
        /// The files.
        files: Vec<UploadFile>,
    },
    /// Show or hide a layer.
    SetLayerVisibility {
        /// The layer.
        layer_id: LayerId,
        /// Whether to show it.
        visible: bool,
    },
    /// Read the current state.
    Snapshot,
    /// Read the commands that rebuild the render surface.
    Replay,
}

impl Command {
    /// Whether the command reads or writes the feature store and must
    /// therefore wait for an outstanding load.
    pub const fn is_store_bound(&self) -> bool {
        !matches!(
            self,
            Self::Upload { .. } | Self::SetLayerVisibility { .. } | Self::Snapshot | Self::Replay
        )
    }
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "data", rename_all = "snake_case")]
pub enum CommandReply {
    /// A feature was created or changed.
    Feature(Feature),
    /// A feature was removed.
    Deleted(Feature),
    /// Nothing changed.
    Ignored,
    /// The viewport was focused on this box.
    Focused(BoundingBox),
    /// Per-file upload results.
    Uploaded(Vec<UploadReport>),
    /// Whether a visibility change was applied.
    Visibility {
        /// False when the layer does not exist on the surface.
        applied: bool,
    },
    /// The current state.
    Snapshot(WorkspaceSnapshot),
    /// Commands that rebuild the render surface.
    Replay(Vec<RenderCommand>),
}

/// Read-only view of the workspace state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkspaceSnapshot {
    /// Workspace kind.
    pub kind: WorkspaceKind,
    /// Signed-in user.
    pub user: Option<UserId>,
    /// Whether the initial load is outstanding.
    pub loading: bool,
    /// Features in insertion order.
    pub features: Vec<Feature>,
    /// Uploaded layers in upload order.
    pub layers: Vec<Layer>,
    /// The focused feature.
    pub focused: Option<FeatureId>,
}

/// Reply channel of a [`Request`].
pub type ReplySender = oneshot::Sender<Result<CommandReply, WorkspaceError>>;

/// A command plus an optional reply channel.
#[derive(Debug)]
pub struct Request {
    /// The command.
    pub command: Command,
    /// Where to send the result.
    pub reply: Option<ReplySender>,
}

impl Request {
    /// A request whose result is awaited.
    pub fn new(
        command: Command,
    ) -> (Self, oneshot::Receiver<Result<CommandReply, WorkspaceError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                command,
                reply: Some(tx),
            },
            rx,
        )
    }

    /// A request whose result is not awaited.
    pub const fn fire(command: Command) -> Self {
        Self {
            command,
            reply: None,
        }
    }
}

/// A finished remote call.
#[derive(Debug)]
enum Completion {
    Load {
        generation: u64,
        result: Result<Vec<FeatureRecord>, RemoteError>,
    },
    Write(WriteCompletion),
}

/// One workspace: a feature store plus everything that feeds and mirrors it.
pub struct Workspace<R, S> {
    kind: WorkspaceKind,
    map: MapConfig,
    store: FeatureStore,
    changes: broadcast::Receiver<StoreChange>,
    reconciler: DrawEventReconciler,
    drag: MarkerDragController,
    layers: LayerManager,
    sync: PersistenceSync,
    surface: S,
    remote: Arc<R>,
    notices: broadcast::Sender<Notice>,
    pending: VecDeque<Request>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl<R, S> std::fmt::Debug for Workspace<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("kind", &self.kind)
            .field("features", &self.store.len())
            .field("loading", &self.store.is_loading())
            .field("pending", &self.pending.len())
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl<R: RemoteFeatureStore, S: RenderSurface> Workspace<R, S> {
    /// Create an inactive workspace.
    pub fn new(config: &CartographConfig, remote: Arc<R>, surface: S) -> Self {
        let capacity = config.workspace.channel_capacity;
        let store = FeatureStore::new(config.workspace.kind, capacity);
        let changes = store.subscribe();
        let (notices, _) = broadcast::channel(capacity.max(1));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            kind: config.workspace.kind,
            map: config.map.clone(),
            store,
            changes,
            reconciler: DrawEventReconciler::new(),
            drag: MarkerDragController::new(),
            layers: LayerManager::new(config.layers.clone()),
            sync: PersistenceSync::new(),
            surface,
            remote,
            notices,
            pending: VecDeque::new(),
            completions_tx,
            completions_rx,
            in_flight: 0,
        }
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// The feature store.
    pub const fn store(&self) -> &FeatureStore {
        &self.store
    }

    /// The render surface.
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// The layer manager.
    pub const fn layers(&self) -> &LayerManager {
        &self.layers
    }

    /// The signed-in user.
    pub const fn user(&self) -> Option<&UserId> {
        self.sync.owner()
    }

    /// The focused feature.
    pub const fn focused(&self) -> Option<&FeatureId> {
        self.reconciler.focused()
    }

    /// Number of remote calls not yet completed.
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Number of commands waiting for the load.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Sender for store change notifications, to subscribe UI observers.
    pub fn change_sender(&self) -> broadcast::Sender<StoreChange> {
        self.store.sender()
    }

    /// Sender for user notices, to subscribe UI observers.
    pub fn notice_sender(&self) -> broadcast::Sender<Notice> {
        self.notices.clone()
    }

    /// Current state.
    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            kind: self.kind,
            user: self.sync.owner().cloned(),
            loading: self.store.is_loading(),
            features: self.store.list(),
            layers: self.layers.layers(),
            focused: self.reconciler.focused().cloned(),
        }
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    /// React to the identity value.
    pub fn apply_identity(&mut self, user: Option<UserId>) {
        match user {
            Some(user) => self.activate(user),
            None => self.deactivate(),
        }
    }

    /// Start a session for `user`: clear the store and load their features.
    pub fn activate(&mut self, user: UserId) {
        if self.sync.owner() == Some(&user) {
            return;
        }
        if self.sync.is_active() {
            self.deactivate();
        }

        let generation = self.sync.activate(user.clone());
        self.store.set_owner(Some(user.clone()));
        self.store.clear();
        self.pump();

        if let Some(kind) = self.kind.geometry_kind() {
            self.store.set_loading(true);
            let remote = Arc::clone(&self.remote);
            let tx = self.completions_tx.clone();
            self.in_flight = self.in_flight.saturating_add(1);
            info!(user = %user, %kind, "Loading features");
            tokio::spawn(async move {
                let result = remote.load(&user, kind).await;
                let _ = tx.send(Completion::Load { generation, result });
            });
        }
    }

    /// End the session: discard queued commands and in-flight results, and
    /// clear the store.
    pub fn deactivate(&mut self) {
        if !self.sync.is_active() {
            return;
        }
        self.sync.deactivate();
        self.store.set_owner(None);
        self.store.set_loading(false);
        if !self.pending.is_empty() {
            debug!(dropped = self.pending.len(), "Dropping commands queued for the ended session");
            self.pending.clear();
        }
        self.store.clear();
        self.pump();
    }

    // -------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------

    /// Run a command now, or queue it while the load is outstanding.
    pub fn dispatch(&mut self, request: Request) {
        if self.store.is_loading() && request.command.is_store_bound() {
            debug!(queued = self.pending.len().saturating_add(1), "Command queued until load completes");
            self.pending.push_back(request);
            return;
        }
        let result = self.execute(request.command);
        if let Some(reply) = request.reply {
            let _ = reply.send(result);
        }
    }

    /// Run a command immediately.
    ///
    /// # Errors
    ///
    /// Returns the [`WorkspaceError`] of the failed operation. A notice has
    /// already been published for it.
    pub fn execute(&mut self, command: Command) -> Result<CommandReply, WorkspaceError> {
        let result = match command {
            Command::Surface(event) => self.on_surface_event(&event),
            Command::AddMarker { coordinate } => {
                let point = Geometry::Point(coordinate.unwrap_or(self.map.center));
                let created = self.store.create(NewFeature::from_geometry(point));
                self.notify_outcome(&created, "added successfully!", "add");
                created.map(CommandReply::Feature)
            }
            Command::AddPathPoint { coordinate } => {
                self.add_path_point(coordinate).map(CommandReply::Feature)
            }
            Command::RemovePathPoint { index } => self.remove_path_point(index),
            Command::Rename { id, name } => {
                let renamed = self.store.update(&id, FeaturePatch::rename(name));
                self.notify_outcome(&renamed, "name updated successfully!", "update");
                renamed.map(CommandReply::Feature)
            }
            Command::Delete { id } => {
                if self.store.contains(&id) {
                    let deleted = self.store.delete(&id);
                    self.notify_outcome(&deleted, "deleted successfully!", "delete");
                    deleted.map(CommandReply::Deleted)
                } else {
                    debug!(feature = %id, "Delete of an absent feature ignored");
                    Ok(CommandReply::Ignored)
                }
            }
            Command::Focus { id } => self
                .reconciler
                .focus(&self.store, &mut self.surface, &id, self.map.focus_padding)
                .map(CommandReply::Focused),
            Command::Upload { files } => Ok(CommandReply::Uploaded(self.upload(&files))),
            Command::SetLayerVisibility { layer_id, visible } => Ok(CommandReply::Visibility {
                applied: self.layers.set_visibility(&mut self.surface, &layer_id, visible),
            }),
            Command::Snapshot => Ok(CommandReply::Snapshot(self.snapshot())),
            Command::Replay => Ok(CommandReply::Replay(self.surface.replay())),
        };
        self.pump();
        result
    }

    fn on_surface_event(&mut self, event: &SurfaceEvent) -> Result<CommandReply, WorkspaceError> {
        match event {
            SurfaceEvent::MarkerDragStarted { id } => {
                self.drag.begin(&self.store, id);
                Ok(CommandReply::Ignored)
            }
            SurfaceEvent::MarkerDragEnded { id, coordinate } => {
                Ok(match self.drag.end(&mut self.store, id, *coordinate)? {
                    Some(feature) => CommandReply::Feature(feature),
                    None => CommandReply::Ignored,
                })
            }
            SurfaceEvent::MarkerDragCancelled { id } => {
                self.drag.cancel(id);
                Ok(CommandReply::Ignored)
            }
            SurfaceEvent::PrimitiveCreated { .. }
            | SurfaceEvent::PrimitiveUpdated { .. }
            | SurfaceEvent::PrimitiveDeleted { .. } => {
                match self.reconciler.handle(&mut self.store, event) {
                    Ok(Reconciled::Created(feature)) => {
                        self.notify(Notice::success(format!(
                            "{} added successfully!",
                            self.kind.noun()
                        )));
                        Ok(CommandReply::Feature(feature))
                    }
                    Ok(Reconciled::Updated(feature)) => Ok(CommandReply::Feature(feature)),
                    Ok(Reconciled::Deleted(feature)) => {
                        self.notify(Notice::info(format!(
                            "{} removed successfully.",
                            self.kind.noun()
                        )));
                        Ok(CommandReply::Deleted(feature))
                    }
                    Ok(Reconciled::Ignored) => Ok(CommandReply::Ignored),
                    Err(err @ WorkspaceError::Validation(_)) => {
                        self.notify(Notice::error(format!(
                            "Failed to add {}: {err}",
                            self.noun_lower()
                        )));
                        Err(err)
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    fn path_feature(&self) -> Option<Feature> {
        self.store.list().into_iter().next()
    }

    fn add_path_point(&mut self, coordinate: Coordinate) -> Result<Feature, WorkspaceError> {
        match self.path_feature() {
            None => self
                .store
                .create(NewFeature::from_geometry(Geometry::Path(vec![coordinate]))),
            Some(path) => {
                let mut points = path.geometry.coordinates().to_vec();
                points.push(coordinate);
                self.store
                    .update(&path.id, FeaturePatch::geometry(Geometry::Path(points)))
            }
        }
    }

    fn remove_path_point(&mut self, index: usize) -> Result<CommandReply, WorkspaceError> {
        let path = self
            .path_feature()
            .ok_or(ValidationError::NoSuchPoint { index })?;
        let mut points = path.geometry.coordinates().to_vec();
        if index >= points.len() {
            return Err(ValidationError::NoSuchPoint { index }.into());
        }
        points.remove(index);

        if points.is_empty() {
            return self.store.delete(&path.id).map(CommandReply::Deleted);
        }
        self.store
            .update(&path.id, FeaturePatch::geometry(Geometry::Path(points)))
            .map(CommandReply::Feature)
    }

    fn upload(&mut self, files: &[UploadFile]) -> Vec<UploadReport> {
        let results = self.layers.upload_all(&mut self.surface, files);
        results
            .iter()
            .map(|(file_name, result)| {
                match result {
                    Ok(UploadOutcome::Created { layer_id }) => {
                        debug!(layer = %layer_id, "Layer added");
                    }
                    Ok(UploadOutcome::DataUpdated { layer_id }) => {
                        self.notify(Notice::info(format!("Layer \"{layer_id}\" data updated.")));
                    }
                    Err(ValidationError::UnsupportedFileType { .. }) => {
                        self.notify(Notice::error(
                            "Unsupported file type. Only .geojson files are supported.",
                        ));
                    }
                    Err(ValidationError::MalformedDataset { .. }) => {
                        self.notify(Notice::error("Invalid GeoJSON format."));
                    }
                    Err(err) => {
                        self.notify(Notice::error(format!(
                            "An error occurred while adding the layer: {err}"
                        )));
                    }
                }
                UploadReport::new(file_name.as_str(), result)
            })
            .collect()
    }

    // -------------------------------------------------------------------
    // Pipeline
    // -------------------------------------------------------------------

    /// Drain pending store changes through every pipeline stage.
    fn pump(&mut self) {
        loop {
            match self.changes.try_recv() {
                Ok(change) => self.route(&change),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Workspace pipeline lagged behind store changes");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    fn route(&mut self, change: &StoreChange) {
        apply_change(&mut self.surface, change);

        match change {
            StoreChange::Created { feature } | StoreChange::Updated { feature } => {
                self.reconciler.observe(feature);
            }
            StoreChange::Deleted { feature } => {
                self.reconciler.forget(&feature.id);
                self.drag.forget(&feature.id);
            }
            StoreChange::Cleared { .. } => {
                self.reconciler.reset();
                self.drag.reset();
            }
            StoreChange::Synced { .. } | StoreChange::Loaded { .. } => {}
        }

        if let Some(write) = self.sync.on_change(change) {
            self.spawn_write(write);
        }
    }

    fn spawn_write(&mut self, write: WriteRequest) {
        let generation = self.sync.generation();
        let feature = write.feature().clone();
        let version = write.version();
        let remote = Arc::clone(&self.remote);
        let tx = self.completions_tx.clone();
        self.in_flight = self.in_flight.saturating_add(1);
        debug!(feature = %feature, version, "Issuing remote write");

        tokio::spawn(async move {
            let outcome = match write {
                WriteRequest::Create { draft, .. } => WriteOutcome::Created(remote.create(draft).await),
                WriteRequest::Update {
                    remote_id, draft, ..
                } => WriteOutcome::Updated(remote.update(&remote_id, draft).await),
                WriteRequest::Delete {
                    remote_id,
                    owner,
                    version,
                    ..
                } => WriteOutcome::Deleted(remote.delete(&remote_id, &owner, version).await),
            };
            let _ = tx.send(Completion::Write(WriteCompletion {
                generation,
                feature,
                version,
                outcome,
            }));
        });
    }

    // -------------------------------------------------------------------
    // Completions
    // -------------------------------------------------------------------

    /// Wait for the next remote call to finish and apply it. Returns
    /// `false` when nothing is in flight.
    pub async fn next_completion(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.completions_rx.recv().await {
            Some(completion) => {
                self.on_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Apply completions until nothing is in flight.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    fn on_completion(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Load { generation, result } => self.finish_load(generation, result),
            Completion::Write(completion) => {
                let action = match completion.outcome {
                    WriteOutcome::Created(_) => "add",
                    WriteOutcome::Updated(_) => "update",
                    WriteOutcome::Deleted(_) => "delete",
                };
                let effect = self.sync.on_completion(&mut self.store, completion);
                for write in effect.writes {
                    self.spawn_write(write);
                }
                if let Some(err) = effect.error {
                    warn!(error = %err, "Remote write failed, keeping local state");
                    self.notify(Notice::error(format!(
                        "Failed to {action} {}. Please try again later.",
                        self.noun_lower()
                    )));
                }
                self.pump();
            }
        }
    }

    fn finish_load(&mut self, generation: u64, result: Result<Vec<FeatureRecord>, RemoteError>) {
        if generation != self.sync.generation() {
            debug!(generation, current = self.sync.generation(), "Superseded load discarded");
            return;
        }
        match result {
            Ok(records) => {
                let features = self.sync.features_from_records(records);
                let count = self.store.hydrate(features);
                info!(count, "Features loaded");
            }
            Err(source) => {
                let err = WorkspaceError::RemoteLoadFailed(source);
                warn!(error = %err, "Load failed, starting empty");
                self.notify(Notice::error(format!(
                    "Failed to load {}s. Please try again later.",
                    self.noun_lower()
                )));
            }
        }
        self.store.set_loading(false);
        self.pump();

        let queued = std::mem::take(&mut self.pending);
        if !queued.is_empty() {
            debug!(count = queued.len(), "Replaying queued commands");
        }
        for request in queued {
            self.dispatch(request);
        }
    }

    // -------------------------------------------------------------------
    // Runtime
    // -------------------------------------------------------------------

    /// Run the workspace until the command channel closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Request>,
        mut identity: watch::Receiver<Option<UserId>>,
    ) {
        let initial = identity.borrow_and_update().clone();
        self.apply_identity(initial);
        info!(kind = ?self.kind, "Workspace running");

        loop {
            // Identity first: a command sent after a sign-in returned must
            // see the new session.
            tokio::select! {
                biased;
                changed = identity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let user = identity.borrow_and_update().clone();
                    self.apply_identity(user);
                }
                Some(completion) = self.completions_rx.recv() => self.on_completion(completion),
                request = commands.recv() => match request {
                    Some(request) => self.dispatch(request),
                    None => break,
                },
            }
        }
        info!("Workspace stopped");
    }

    // -------------------------------------------------------------------
    // Notices
    // -------------------------------------------------------------------

    fn notify_outcome<T>(
        &self,
        result: &Result<T, WorkspaceError>,
        success: &str,
        action: &str,
    ) {
        match result {
            Ok(_) => self.notify(Notice::success(format!("{} {success}", self.kind.noun()))),
            Err(err) => self.notify(Notice::error(format!(
                "Failed to {action} {}: {err}",
                self.noun_lower()
            ))),
        }
    }

    fn notify(&self, notice: Notice) {
        debug!(level = ?notice.level, message = %notice.message, "Notice");
        let _ = self.notices.send(notice);
    }

    fn noun_lower(&self) -> String {
        self.kind.noun().to_lowercase()
    }
}
