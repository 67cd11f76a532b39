// Each domain contains: mod.rs, resolvers.rs, types.rs

pub mod bookings;
pub mod notifications;
pub mod payments;
