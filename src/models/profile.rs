use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub experience_years: Option<i64>,
    pub price_range: Option<String>,
    pub service_category: Option<String>,
    pub service_area: Option<String>,
    pub address: Option<String>,
    pub is_verified: bool,
    pub is_suspended: bool,
    pub average_rating: f64,
    pub total_reviews: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Profile {
    /// Providers are listed with a nudge until they pick a category.
    pub fn is_complete(&self) -> bool {
        match self.role {
            Role::Provider => self
                .service_category
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty()),
            _ => true,
        }
    }

    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(match self.role {
                Role::Provider => "Service Pro",
                Role::Customer => "Customer",
                Role::Admin => "Admin",
            })
    }

    /// Applies the fields a role is allowed to edit; the rest are ignored.
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(v) = update.full_name {
            self.full_name = non_empty(v);
        }
        if let Some(v) = update.email {
            self.email = non_empty(v);
        }
        if let Some(v) = update.phone {
            self.phone = non_empty(v);
        }

        match self.role {
            Role::Customer => {
                if let Some(v) = update.address {
                    self.address = non_empty(v);
                }
            }
            Role::Provider => {
                if let Some(v) = update.bio {
                    self.bio = non_empty(v);
                }
                if let Some(v) = update.experience_years {
                    self.experience_years = Some(v.max(0));
                }
                if let Some(v) = update.price_range {
                    self.price_range = non_empty(v);
                }
                if let Some(v) = update.service_category {
                    self.service_category = non_empty(v);
                }
                if let Some(v) = update.service_area {
                    self.service_area = non_empty(v);
                }
            }
            Role::Admin => {}
        }
    }
}

fn non_empty(v: String) -> Option<String> {
    let trimmed = v.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub experience_years: Option<i64>,
    pub price_range: Option<String>,
    pub service_category: Option<String>,
    pub service_area: Option<String>,
    pub address: Option<String>,
}
