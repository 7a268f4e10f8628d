//! Version command

use crate::output::{OutputContext, human::HumanRenderer};

/// Run the version command.
pub fn run(ctx: &OutputContext, json: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if json {
        println!(r#"{{"version":"{version}"}}"#);
    } else {
        HumanRenderer::new(ctx).render_version(version);
    }
}
