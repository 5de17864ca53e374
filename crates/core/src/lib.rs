pub mod config;
pub mod domain;
pub mod errors;
pub mod policy;
pub mod token;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::approval::{ApprovalDecision, ApprovalRequest, ApprovalReview, ApprovalStatus};
pub use domain::customer::{Customer, CustomerId, Vehicle, VehicleId};
pub use domain::event::{EventPayload, JobEvent, JobEventId, JobEventType};
pub use domain::job::{Job, JobId, JobPriority, JobState, NewJob};
pub use domain::line_item::{LineItem, LineItemId, LineItemStatus, LineItemType, NewLineItem};
pub use domain::media::{InspectionMedia, MediaId, MediaType, NewMedia};
pub use domain::principal::{Principal, Role, ShopId, UserId};
pub use errors::{EngineError, EngineResult};
