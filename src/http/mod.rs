pub mod health;
pub mod leaderboards;
pub mod scores;
pub mod shutdown;

use rocket::{Build, Rocket};

pub fn mount_all(rocket_build: Rocket<Build>) -> Rocket<Build> {
    let rocket_build = health::mount(rocket_build);
    let rocket_build = leaderboards::mount(rocket_build);
    scores::mount(rocket_build)
}
