use crate::transform::Transform;
use bevy_ecs::prelude::*;

/// Opaque id of something the world spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(Entity);

impl EntityHandle {
    pub fn from_entity(entity: Entity) -> Self {
        Self(entity)
    }

    pub fn entity(self) -> Entity {
        self.0
    }

    pub fn index(self) -> u32 {
        self.0.index()
    }
}

/// Spawning and placement services the race needs from the host world.
pub trait WorldHost {
    fn find_spawn_point(&mut self) -> Option<Transform>;
    fn spawn_ghost_entity(&mut self, transform: Transform) -> EntityHandle;
    fn spawn_vehicle(&mut self, transform: Transform) -> EntityHandle;
    /// Marks `entity` as the player-controlled one. Returns false for unknown entities.
    fn possess(&mut self, entity: EntityHandle) -> bool;
    fn set_entity_transform(&mut self, entity: EntityHandle, transform: Transform) -> bool;
    fn despawn(&mut self, entity: EntityHandle) -> bool;
}

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Pose(pub Transform);

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct PlayerStart;

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct VehicleBody;

/// Non-interactive replay car. Carries no collision or input components.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct GhostCar;

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Possessed;

/// Reference [`WorldHost`] backed by a `bevy_ecs` world.
pub struct SimWorld {
    pub world: World,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self { world: World::new() }
    }

    pub fn add_player_start(&mut self, transform: Transform) -> EntityHandle {
        EntityHandle(self.world.spawn((Pose(transform), PlayerStart)).id())
    }

    pub fn entity_transform(&self, entity: EntityHandle) -> Option<Transform> {
        self.world.get::<Pose>(entity.0).map(|pose| pose.0)
    }

    pub fn is_ghost(&self, entity: EntityHandle) -> bool {
        self.world.get::<GhostCar>(entity.0).is_some()
    }

    pub fn ghost_entities(&mut self) -> Vec<EntityHandle> {
        let mut query = self.world.query_filtered::<Entity, With<GhostCar>>();
        query.iter(&self.world).map(EntityHandle).collect()
    }

    pub fn vehicle_entities(&mut self) -> Vec<EntityHandle> {
        let mut query = self.world.query_filtered::<Entity, With<VehicleBody>>();
        query.iter(&self.world).map(EntityHandle).collect()
    }

    pub fn possessed(&mut self) -> Option<EntityHandle> {
        let mut query = self.world.query_filtered::<Entity, With<Possessed>>();
        query.iter(&self.world).next().map(EntityHandle)
    }

    pub fn entity_count(&self) -> usize {
        self.world.iter_entities().count()
    }
}

impl WorldHost for SimWorld {
    fn find_spawn_point(&mut self) -> Option<Transform> {
        let mut query = self.world.query_filtered::<&Pose, With<PlayerStart>>();
        query.iter(&self.world).next().map(|pose| pose.0)
    }

    fn spawn_ghost_entity(&mut self, transform: Transform) -> EntityHandle {
        EntityHandle(self.world.spawn((Pose(transform), GhostCar)).id())
    }

    fn spawn_vehicle(&mut self, transform: Transform) -> EntityHandle {
        EntityHandle(self.world.spawn((Pose(transform), VehicleBody)).id())
    }

    fn possess(&mut self, entity: EntityHandle) -> bool {
        if self.world.get::<Pose>(entity.0).is_none() {
            return false;
        }
        let previous: Vec<Entity> = {
            let mut query = self.world.query_filtered::<Entity, With<Possessed>>();
            query.iter(&self.world).collect()
        };
        for other in previous {
            self.world.entity_mut(other).remove::<Possessed>();
        }
        self.world.entity_mut(entity.0).insert(Possessed);
        true
    }

    fn set_entity_transform(&mut self, entity: EntityHandle, transform: Transform) -> bool {
        match self.world.get_mut::<Pose>(entity.0) {
            Some(mut pose) => {
                pose.0 = transform;
                true
            }
            None => false,
        }
    }

    fn despawn(&mut self, entity: EntityHandle) -> bool {
        self.world.despawn(entity.0)
    }
}
