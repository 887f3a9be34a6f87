use clap::Parser;
use nebula_engine::render::{RebuildPolicy, StageConfig};

#[derive(Parser, Debug)]
#[command(name = "nebula", version, about = "Ray-traced sphere composited onto a full-screen quad")]
pub struct Cli {
    /// Composite a static texture instead of tracing the sphere.
    #[arg(long)]
    pub no_ray_tracing: bool,

    /// Build the acceleration structure on the first frame only.
    #[arg(long)]
    pub build_once: bool,
}

impl Cli {
    pub fn stage_config(&self) -> StageConfig {
        StageConfig {
            ray_tracing: !self.no_ray_tracing,
            rebuild: if self.build_once {
                RebuildPolicy::BuildOnce
            } else {
                RebuildPolicy::EveryFrame
            },
            ..StageConfig::default()
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_keep_the_defaults() {
        let config = Cli::try_parse_from(["nebula"]).unwrap().stage_config();
        assert!(config.ray_tracing);
        assert_eq!(config.rebuild, RebuildPolicy::EveryFrame);
    }

    #[test]
    fn flags_map_onto_the_stage_config() {
        let config = Cli::try_parse_from(["nebula", "--no-ray-tracing", "--build-once"])
            .unwrap()
            .stage_config();
        assert!(!config.ray_tracing);
        assert_eq!(config.rebuild, RebuildPolicy::BuildOnce);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["nebula", "--build_once"]).is_err());
    }
}
