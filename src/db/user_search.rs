//! Composable filters for user search.
//!
//! Each filter renders one SQL predicate; all predicates are ANDed. Filters
//! built from blank input are dropped so they never narrow the result.

use sqlx::{QueryBuilder, Sqlite};

/// A single search predicate over the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    /// Only users who verified their email.
    Verified,
    /// Case-insensitive substring match on first and/or last name.
    NameContains(String),
    /// Case-insensitive role equality.
    HasRole(String),
    /// Years of experience within an inclusive range; either bound may be open.
    ExperienceInRange { min: Option<i32>, max: Option<i32> },
    /// Industry is one of the given values, compared case-insensitively.
    IndustryIn(Vec<String>),
}

impl UserFilter {
    fn push_sql(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            UserFilter::Verified => {
                builder.push("is_verified = 1");
            }
            UserFilter::NameContains(text) => {
                let text = text.trim().to_lowercase();
                match text.split_once(' ') {
                    Some((first, last)) => {
                        builder.push("(lower(first_name) LIKE ");
                        builder.push_bind(like_pattern(first));
                        builder.push(LIKE_ESCAPE);
                        builder.push(" AND lower(last_name) LIKE ");
                        builder.push_bind(like_pattern(last.trim()));
                        builder.push(LIKE_ESCAPE);
                        builder.push(")");
                    }
                    None => {
                        let pattern = like_pattern(&text);
                        builder.push("(lower(first_name) LIKE ");
                        builder.push_bind(pattern.clone());
                        builder.push(LIKE_ESCAPE);
                        builder.push(" OR lower(last_name) LIKE ");
                        builder.push_bind(pattern);
                        builder.push(LIKE_ESCAPE);
                        builder.push(")");
                    }
                }
            }
            UserFilter::HasRole(role) => {
                builder.push("lower(role) = ");
                builder.push_bind(role.trim().to_lowercase());
            }
            UserFilter::ExperienceInRange { min, max } => match (min, max) {
                (Some(min), Some(max)) => {
                    builder.push("years_of_experience BETWEEN ");
                    builder.push_bind(*min);
                    builder.push(" AND ");
                    builder.push_bind(*max);
                }
                (Some(min), None) => {
                    builder.push("years_of_experience >= ");
                    builder.push_bind(*min);
                }
                (None, Some(max)) => {
                    builder.push("years_of_experience <= ");
                    builder.push_bind(*max);
                }
                (None, None) => {
                    builder.push("1 = 1");
                }
            },
            UserFilter::IndustryIn(industries) => {
                builder.push("lower(industry) IN (");
                let mut separated = builder.separated(", ");
                for industry in industries {
                    separated.push_bind(industry.to_lowercase());
                }
                separated.push_unseparated(")");
            }
        }
    }
}

/// SQLite has no default LIKE escape character.
const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// `%text%` with LIKE metacharacters escaped by [`LIKE_ESCAPE`].
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// A user search: verified users narrowed by optional filters.
#[derive(Debug, Clone, Default)]
pub struct UserSearch {
    filters: Vec<UserFilter>,
}

impl UserSearch {
    /// Start from the base filter (verified users only).
    pub fn verified() -> Self {
        Self {
            filters: vec![UserFilter::Verified],
        }
    }

    pub fn name_contains(mut self, text: Option<&str>) -> Self {
        if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
            self.filters.push(UserFilter::NameContains(text.to_string()));
        }
        self
    }

    pub fn has_role(mut self, role: Option<&str>) -> Self {
        if let Some(role) = role.map(str::trim).filter(|r| !r.is_empty()) {
            self.filters.push(UserFilter::HasRole(role.to_string()));
        }
        self
    }

    pub fn experience_in_range(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        if min.is_some() || max.is_some() {
            self.filters.push(UserFilter::ExperienceInRange { min, max });
        }
        self
    }

    pub fn industry_in(mut self, industries: &[String]) -> Self {
        let industries: Vec<String> = industries
            .iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        if !industries.is_empty() {
            self.filters.push(UserFilter::IndustryIn(industries));
        }
        self
    }

    pub fn filters(&self) -> &[UserFilter] {
        &self.filters
    }

    /// Append ` WHERE ...` for the active filters.
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        for (i, filter) in self.filters.iter().enumerate() {
            builder.push(if i == 0 { " WHERE " } else { " AND " });
            filter.push_sql(builder);
        }
    }
}
