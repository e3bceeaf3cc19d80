//! Log group the task's container writes to

use super::settings::StackSettings;
use super::template::{Resource, Template};

pub const LOG_GROUP_ID: &str = "ServiceLogGroup";

/// Declare the log group; it outlives the stack
pub fn declare(template: &mut Template, settings: &StackSettings) -> String {
    template.add(
        LOG_GROUP_ID,
        Resource::new("AWS::Logs::LogGroup")
            .property("LogGroupName", settings.log_group_name.as_str())
            .property("RetentionInDays", settings.log_retention_days)
            .retain(),
    )
}
