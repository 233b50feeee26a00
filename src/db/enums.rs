use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum IdeaStatus {
    #[default]
    #[sea_orm(string_value = "Pendiente")]
    #[serde(rename = "Pendiente")]
    Pending,
    #[sea_orm(string_value = "En Progreso")]
    #[serde(rename = "En Progreso")]
    InProgress,
    #[sea_orm(string_value = "Completada")]
    #[serde(rename = "Completada")]
    Completed,
}

impl IdeaStatus {
    pub const ALL: [IdeaStatus; 3] = [
        IdeaStatus::Pending,
        IdeaStatus::InProgress,
        IdeaStatus::Completed,
    ];

    /// Label stored in the database and shown in forms.
    pub fn label(&self) -> &'static str {
        match self {
            IdeaStatus::Pending => "Pendiente",
            IdeaStatus::InProgress => "En Progreso",
            IdeaStatus::Completed => "Completada",
        }
    }
}

impl FromStr for IdeaStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pendiente" => Ok(IdeaStatus::Pending),
            "En Progreso" => Ok(IdeaStatus::InProgress),
            "Completada" => Ok(IdeaStatus::Completed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
