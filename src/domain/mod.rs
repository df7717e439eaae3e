// Domain layer: models, parameter bundles and ports. No backend SDKs here.

pub mod model;
pub mod params;
pub mod ports;
