use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub metric_type: String,
    pub condition_type: String,
    pub config_json: String,
    pub check_interval_minutes: i64,
    pub cooldown_minutes: i64,
    pub severity: String,
    pub channel_ids_json: String,
    pub escalation_policy_id: Option<String>,
    pub enabled: bool,
    pub last_evaluated_at: Option<DateTimeWithTimeZone>,
    pub last_triggered_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
