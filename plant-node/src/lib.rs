//! Battery-powered plant-monitor node: periodically samples the sensor
//! bank, encodes one telemetry record per cycle and delivers it to the
//! broker, caching locally whenever delivery is impossible and replaying
//! once connectivity returns.

pub mod config;
pub mod pipeline;
pub mod provisioning;
pub mod runner;
pub mod scheduler;
