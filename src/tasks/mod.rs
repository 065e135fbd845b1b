pub mod fast_loop;
pub mod radio_task;
pub mod telemetry_task;
