use cucumber::given;

use crate::{cucumber::ReconWorld, support::ReconSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut ReconWorld) {
    let system = ReconSystem::new().await;
    world.system = Some(system);
}

#[given("a fresh install that never dispatches fulfillment")]
async fn fresh_database_without_dispatch(world: &mut ReconWorld) {
    let system = ReconSystem::without_dispatch().await;
    world.system = Some(system);
}
