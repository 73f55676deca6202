//! Model presenter - loads one glTF model, frames it and spins it
//!
//! A reload replaces the presented model. Results of superseded loads are
//! discarded by generation, so a slow old URL never overwrites a new one.

use bevy::asset::LoadState;
use bevy::gltf::Gltf;
use bevy::prelude::*;
use selfie_core::{
    AssetLoadError, Framing, LoadOutcome, LoadTicket, ModelConfig, ModelLoadTracker, ModelSource,
    ModelStatus, Spin,
};

/// Replace the presented model (blank clears it)
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct ReloadModel(pub String);

/// The model currently in the scene
#[derive(Component, Debug)]
pub struct PresentedModel {
    pub source: ModelSource,
    pub spin: Spin,
}

/// Presenter state: load bookkeeping plus the spawned entity
#[derive(Resource)]
pub struct ModelPresenter {
    tracker: ModelLoadTracker,
    framing: Framing,
    spin_per_frame: f32,
    initial_source: String,
    loading: Option<(LoadTicket, Handle<Gltf>)>,
    entity: Option<Entity>,
}

impl ModelPresenter {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            tracker: ModelLoadTracker::new(),
            framing: Framing::from_config(config),
            spin_per_frame: config.spin_per_frame,
            initial_source: config.default_url.clone(),
            loading: None,
            entity: None,
        }
    }

    pub fn status(&self) -> &ModelStatus {
        self.tracker.status()
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn entity(&self) -> Option<Entity> {
        self.entity
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    /// Source configured at startup
    pub fn initial_source(&self) -> &str {
        &self.initial_source
    }
}

/// Plugin for the model presenter
pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<ReloadModel>()
            .add_systems(Startup, request_initial_model)
            .add_systems(Update, (handle_reload, poll_model_load, spin_models).chain());
    }
}

fn request_initial_model(presenter: Res<ModelPresenter>, mut reloads: MessageWriter<ReloadModel>) {
    reloads.write(ReloadModel(presenter.initial_source.clone()));
}

fn handle_reload(
    mut commands: Commands,
    mut reloads: MessageReader<ReloadModel>,
    mut presenter: ResMut<ModelPresenter>,
    asset_server: Res<AssetServer>,
) {
    // Only the newest request in a frame matters
    let Some(ReloadModel(input)) = reloads.read().last().cloned() else {
        return;
    };

    if let Some(entity) = presenter.entity.take() {
        commands.entity(entity).despawn();
    }
    presenter.loading = None;

    if let Some(ticket) = presenter.tracker.request(&input) {
        let handle: Handle<Gltf> = asset_server.load(ticket.source.as_str().to_string());
        presenter.loading = Some((ticket, handle));
    }
}

fn poll_model_load(
    mut commands: Commands,
    mut presenter: ResMut<ModelPresenter>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
) {
    let Some((ticket, handle)) = presenter.loading.clone() else {
        return;
    };
    let Some(result) = load_result(&ticket, &handle, &asset_server, &gltf_assets) else {
        return;
    };

    presenter.loading = None;
    finish_load(&mut commands, &mut presenter, &ticket, result);
}

/// Scene to show for a finished load, or `None` while still loading
fn load_result(
    ticket: &LoadTicket,
    handle: &Handle<Gltf>,
    asset_server: &AssetServer,
    gltf_assets: &Assets<Gltf>,
) -> Option<Result<Handle<Scene>, AssetLoadError>> {
    match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) => {
            let gltf = gltf_assets.get(handle)?;
            Some(
                gltf.default_scene
                    .clone()
                    .or_else(|| gltf.scenes.first().cloned())
                    .ok_or_else(|| AssetLoadError::NoScene(ticket.source.to_string())),
            )
        }
        Some(LoadState::Failed(err)) => Some(Err(AssetLoadError::LoadFailed {
            url: ticket.source.to_string(),
            reason: err.to_string(),
        })),
        _ => None,
    }
}

/// Report a finished load and spawn the model if it is still wanted
fn finish_load(
    commands: &mut Commands,
    presenter: &mut ModelPresenter,
    ticket: &LoadTicket,
    result: Result<Handle<Scene>, AssetLoadError>,
) {
    let (outcome, scene) = match result {
        Ok(scene) => (presenter.tracker.complete(ticket, Ok(())), Some(scene)),
        Err(err) => (presenter.tracker.complete(ticket, Err(err)), None),
    };

    if let (LoadOutcome::Applied, Some(scene)) = (outcome, scene) {
        let framing = presenter.framing;
        let entity = commands
            .spawn((
                SceneRoot(scene),
                Transform::from_translation(Vec3::from(framing.translation()))
                    .with_scale(Vec3::splat(framing.scale)),
                PresentedModel {
                    source: ticket.source.clone(),
                    spin: Spin::new(presenter.spin_per_frame),
                },
            ))
            .id();
        presenter.entity = Some(entity);
    }
}

/// Resolve the in-flight load with an empty scene, as if the asset arrived
#[cfg(test)]
pub(crate) fn complete_pending_load(world: &mut World) -> Option<Entity> {
    use bevy::ecs::system::RunSystemOnce;

    world
        .run_system_once(
            |mut commands: Commands, mut presenter: ResMut<ModelPresenter>| {
                let (ticket, _) = presenter.loading.take()?;
                finish_load(&mut commands, &mut presenter, &ticket, Ok(Handle::default()));
                presenter.entity
            },
        )
        .ok()
        .flatten()
}

/// Advance every presented model by one frame of spin
pub fn spin_models(mut models: Query<(&mut PresentedModel, &mut Transform)>) {
    for (mut model, mut transform) in &mut models {
        let angle = model.spin.advance();
        transform.rotation = Quat::from_rotation_y(angle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    #[test]
    fn test_spin_follows_frame_count() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_systems(Update, spin_models);
        let entity = app
            .world_mut()
            .spawn((
                PresentedModel {
                    source: ModelSource::parse("models/a.glb").unwrap(),
                    spin: Spin::new(0.01),
                },
                Transform::from_xyz(0.0, -0.5, 0.0).with_scale(Vec3::splat(0.1)),
            ))
            .id();

        for _ in 0..100 {
            app.update();
        }

        let transform = app.world().get::<Transform>(entity).unwrap();
        assert!(transform.rotation.angle_between(Quat::from_rotation_y(1.0)) < 1e-4);
        // Framing is untouched by the spin
        assert_eq!(transform.translation, Vec3::new(0.0, -0.5, 0.0));
        assert_eq!(transform.scale, Vec3::splat(0.1));

        let model = app.world().get::<PresentedModel>(entity).unwrap();
        assert_eq!(model.spin.frames(), 100);
    }

    fn presenter_app(config: &ModelConfig) -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Gltf>()
            .insert_resource(ModelPresenter::new(config))
            .add_plugins(ModelsPlugin);
        app
    }

    #[test]
    fn test_blank_default_shows_nothing() {
        let config = ModelConfig {
            default_url: "  ".to_string(),
            ..ModelConfig::default()
        };
        let mut app = presenter_app(&config);
        app.update();
        app.update();

        let presenter = app.world().resource::<ModelPresenter>();
        assert_eq!(presenter.status(), &ModelStatus::Absent);
        assert!(!presenter.is_loading());
        assert!(presenter.entity().is_none());

        let mut models = app.world_mut().query::<&PresentedModel>();
        assert_eq!(models.iter(app.world()).count(), 0);
    }

    #[test]
    fn test_clearing_source_despawns_model() {
        let config = ModelConfig {
            default_url: String::new(),
            ..ModelConfig::default()
        };
        let mut app = presenter_app(&config);
        app.update();

        let stale = app
            .world_mut()
            .spawn((
                PresentedModel {
                    source: ModelSource::parse("models/old.glb").unwrap(),
                    spin: Spin::default(),
                },
                Transform::default(),
            ))
            .id();
        app.world_mut().resource_mut::<ModelPresenter>().entity = Some(stale);

        app.world_mut().write_message(ReloadModel(String::new()));
        app.update();

        assert!(app.world().get_entity(stale).is_err());
        assert!(app.world().resource::<ModelPresenter>().entity().is_none());
    }

    fn settle_load(app: &mut App) {
        for _ in 0..500 {
            app.update();
            if !app.world().resource::<ModelPresenter>().is_loading() {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
    }

    #[test]
    fn test_unreachable_model_fails_without_entity() {
        let config = ModelConfig {
            default_url: "models/does-not-exist.glb".to_string(),
            ..ModelConfig::default()
        };
        let mut app = presenter_app(&config);
        app.update();
        assert!(app.world().resource::<ModelPresenter>().is_loading());

        settle_load(&mut app);

        let presenter = app.world().resource::<ModelPresenter>();
        assert!(!presenter.is_loading());
        assert!(presenter.entity().is_none());
        match presenter.status() {
            ModelStatus::Failed { source, error } => {
                assert_eq!(source.as_str(), "models/does-not-exist.glb");
                assert!(matches!(error, AssetLoadError::LoadFailed { .. }));
            }
            other => panic!("expected a failed load, got {:?}", other),
        }

        let mut models = app.world_mut().query::<&PresentedModel>();
        assert_eq!(models.iter(app.world()).count(), 0);
    }

    #[test]
    fn test_second_reload_replaces_first() {
        let config = ModelConfig {
            default_url: String::new(),
            ..ModelConfig::default()
        };
        let mut app = presenter_app(&config);
        app.update();

        app.world_mut()
            .write_message(ReloadModel("models/first.glb".to_string()));
        app.update();
        app.world_mut()
            .write_message(ReloadModel("models/second.glb".to_string()));
        app.update();

        let second = ModelSource::parse("models/second.glb");
        {
            let presenter = app.world().resource::<ModelPresenter>();
            assert_eq!(presenter.tracker.current().map(|t| &t.source), second.as_ref());
            if let Some((ticket, _)) = &presenter.loading {
                assert_eq!(Some(&ticket.source), second.as_ref());
            }
        }

        settle_load(&mut app);
        let presenter = app.world().resource::<ModelPresenter>();
        assert_eq!(presenter.status().source(), second.as_ref());
        assert!(presenter.entity().is_none());
    }

    fn track(app: &mut App, url: &str) -> LoadTicket {
        app.world_mut()
            .resource_mut::<ModelPresenter>()
            .tracker
            .request(url)
            .unwrap()
    }

    fn finish(app: &mut App, ticket: LoadTicket, result: Result<Handle<Scene>, AssetLoadError>) {
        app.world_mut()
            .run_system_once(
                move |mut commands: Commands, mut presenter: ResMut<ModelPresenter>| {
                    finish_load(&mut commands, &mut presenter, &ticket, result.clone());
                },
            )
            .unwrap();
    }

    #[test]
    fn test_loaded_scene_is_framed_and_spun() {
        let config = ModelConfig {
            default_url: String::new(),
            ..ModelConfig::default()
        };
        let mut app = presenter_app(&config);
        app.update();

        let ticket = track(&mut app, "models/fox.glb");
        finish(&mut app, ticket, Ok(Handle::default()));

        let presenter = app.world().resource::<ModelPresenter>();
        assert_eq!(
            presenter.status(),
            &ModelStatus::Ready(ModelSource::parse("models/fox.glb").unwrap())
        );
        let entity = presenter.entity().unwrap();
        assert!(app.world().get::<SceneRoot>(entity).is_some());
        let transform = app.world().get::<Transform>(entity).unwrap();
        assert_eq!(transform.translation, Vec3::new(0.0, -0.5, 0.0));
        assert_eq!(transform.scale, Vec3::splat(0.1));

        app.update();
        let model = app.world().get::<PresentedModel>(entity).unwrap();
        assert_eq!(model.spin.frames(), 1);
    }

    #[test]
    fn test_stale_and_sceneless_loads() {
        let config = ModelConfig {
            default_url: String::new(),
            ..ModelConfig::default()
        };
        let mut app = presenter_app(&config);
        app.update();

        let old = track(&mut app, "models/old.glb");
        let new = track(&mut app, "models/new.glb");

        // The superseded load completes late and is ignored
        finish(&mut app, old, Ok(Handle::default()));
        {
            let presenter = app.world().resource::<ModelPresenter>();
            assert!(presenter.entity().is_none());
            assert!(matches!(presenter.status(), ModelStatus::Loading(_)));
        }

        finish(
            &mut app,
            new,
            Err(AssetLoadError::NoScene("models/new.glb".to_string())),
        );
        let presenter = app.world().resource::<ModelPresenter>();
        assert!(presenter.entity().is_none());
        assert!(matches!(
            presenter.status(),
            ModelStatus::Failed {
                error: AssetLoadError::NoScene(_),
                ..
            }
        ));
        let mut models = app.world_mut().query::<&PresentedModel>();
        assert_eq!(models.iter(app.world()).count(), 0);
    }
}
