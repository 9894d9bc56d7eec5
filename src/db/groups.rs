//! Group and membership queries.

use chrono::Utc;

use crate::models::{Conversation, ConversationType, Group, GroupMemberDetail, GroupMemberType};
use crate::{Error, Result};

use super::DbPool;

/// Input for creating a group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub id: String,
    pub group_name: String,
    pub description: Option<String>,
    pub created_by: String,
    /// Added as plain members; the creator is skipped if listed.
    pub members: Vec<String>,
    pub conversation_id: String,
}

const MEMBER_DETAIL_SELECT: &str = r#"
    SELECT gm.group_id, gm.user_id, gm.role, gm.joined_at, u.first_name, u.last_name
    FROM group_members gm
    JOIN users u ON u.id = gm.user_id
"#;

/// Create a group with its creator as admin, its initial members and its
/// group conversation, all in one transaction.
pub async fn create_group(pool: &DbPool, input: NewGroup) -> Result<(Group, Conversation)> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let group = sqlx::query_as::<_, Group>(
        r#"
        INSERT INTO groups (id, group_name, description, created_by, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.group_name)
    .bind(&input.description)
    .bind(&input.created_by)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
        .bind(&input.id)
        .bind(&input.created_by)
        .bind(GroupMemberType::Admin.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

    for member in input.members.iter().filter(|m| **m != input.created_by) {
        sqlx::query(
            "INSERT OR IGNORE INTO group_members (group_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&input.id)
        .bind(member)
        .bind(GroupMemberType::Member.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let conversation = sqlx::query_as::<_, Conversation>(
        r#"
        INSERT INTO conversations (id, type, group_id, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.conversation_id)
    .bind(ConversationType::Group.as_str())
    .bind(&input.id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((group, conversation))
}

/// Get a group by ID.
pub async fn get_group(pool: &DbPool, id: &str) -> Result<Group> {
    sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Group not found: {}", id)))
}

/// List the groups a user belongs to, newest first.
pub async fn list_user_groups(pool: &DbPool, user_id: &str) -> Result<Vec<Group>> {
    sqlx::query_as::<_, Group>(
        r#"
        SELECT g.* FROM groups g
        JOIN group_members gm ON gm.group_id = g.id
        WHERE gm.user_id = ?
        ORDER BY g.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// List members of a group in join order.
pub async fn list_group_members(pool: &DbPool, group_id: &str) -> Result<Vec<GroupMemberDetail>> {
    let sql = format!(
        "{} WHERE gm.group_id = ? ORDER BY gm.joined_at, gm.rowid",
        MEMBER_DETAIL_SELECT
    );
    sqlx::query_as::<_, GroupMemberDetail>(&sql)
        .bind(group_id)
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

/// Get one membership, if the user is in the group.
pub async fn get_group_member(
    pool: &DbPool,
    group_id: &str,
    user_id: &str,
) -> Result<Option<GroupMemberDetail>> {
    let sql = format!(
        "{} WHERE gm.group_id = ? AND gm.user_id = ?",
        MEMBER_DETAIL_SELECT
    );
    sqlx::query_as::<_, GroupMemberDetail>(&sql)
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Add a member to a group.
pub async fn add_group_member(
    pool: &DbPool,
    group_id: &str,
    user_id: &str,
    role: GroupMemberType,
) -> Result<GroupMemberDetail> {
    sqlx::query("INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
        .bind(group_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Error::AlreadyExists(format!("User {} is already a member of this group", user_id))
            }
            _ => Error::Database(e),
        })?;

    get_group_member(pool, group_id, user_id)
        .await?
        .ok_or_else(|| Error::Internal("Membership missing after insert".to_string()))
}

/// Outcome of removing a group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRemoval {
    Removed,
    NotMember,
    LastAdmin,
}

/// Remove a member unless they are the group's only admin.
///
/// The admin count is checked inside the DELETE itself, so two admins
/// leaving at once cannot both succeed.
pub async fn remove_group_member(
    pool: &DbPool,
    group_id: &str,
    user_id: &str,
) -> Result<MemberRemoval> {
    let admin = GroupMemberType::Admin.as_str();
    let result = sqlx::query(
        r#"
        DELETE FROM group_members
        WHERE group_id = ? AND user_id = ?
          AND NOT (
            role = ?
            AND (SELECT COUNT(*) FROM group_members WHERE group_id = ? AND role = ?) <= 1
          )
        "#,
    )
    .bind(group_id)
    .bind(user_id)
    .bind(admin)
    .bind(group_id)
    .bind(admin)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(MemberRemoval::Removed);
    }

    Ok(match get_group_member(pool, group_id, user_id).await? {
        Some(_) => MemberRemoval::LastAdmin,
        None => MemberRemoval::NotMember,
    })
}

/// Count admins of a group.
pub async fn count_group_admins(pool: &DbPool, group_id: &str) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM group_members WHERE group_id = ? AND role = ?")
            .bind(group_id)
            .bind(GroupMemberType::Admin.as_str())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_user, get_group_conversation, sample_user, test_pool};
    use crate::models::new_id;

    async fn setup() -> (DbPool, String, String) {
        let pool = test_pool().await;
        let admin = create_user(&pool, sample_user("admin@example.com")).await.unwrap();
        let member = create_user(&pool, sample_user("member@example.com")).await.unwrap();
        (pool, admin.id, member.id)
    }

    fn new_group(created_by: &str, members: Vec<String>) -> NewGroup {
        NewGroup {
            id: new_id(),
            group_name: "Rust Learners".into(),
            description: Some("Weekly study group".into()),
            created_by: created_by.to_string(),
            members,
            conversation_id: new_id(),
        }
    }

    #[tokio::test]
    async fn test_create_group_adds_creator_members_and_conversation() {
        let (pool, admin, member) = setup().await;
        let (group, conversation) =
            create_group(&pool, new_group(&admin, vec![member.clone(), admin.clone()]))
                .await
                .unwrap();

        assert_eq!(conversation.group_id.as_deref(), Some(group.id.as_str()));
        assert_eq!(conversation.type_enum(), ConversationType::Group);

        let members = list_group_members(&pool, &group.id).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].user_id, admin);
        assert!(members[0].is_admin());
        assert_eq!(members[1].user_id, member);
        assert!(!members[1].is_admin());

        let found = get_group_conversation(&pool, &group.id).await.unwrap().unwrap();
        assert_eq!(found.id, conversation.id);
    }

    #[tokio::test]
    async fn test_failed_create_rolls_back() {
        let (pool, admin, _) = setup().await;
        let input = new_group(&admin, vec!["no-such-user".into()]);
        let group_id = input.id.clone();

        assert!(create_group(&pool, input).await.is_err());
        assert!(matches!(
            get_group(&pool, &group_id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_and_remove_member() {
        let (pool, admin, member) = setup().await;
        let (group, _) = create_group(&pool, new_group(&admin, vec![])).await.unwrap();

        let added = add_group_member(&pool, &group.id, &member, GroupMemberType::Member)
            .await
            .unwrap();
        assert_eq!(added.first_name.as_deref(), Some("Master"));

        let dup = add_group_member(&pool, &group.id, &member, GroupMemberType::Member).await;
        assert!(matches!(dup, Err(Error::AlreadyExists(_))));

        assert_eq!(count_group_admins(&pool, &group.id).await.unwrap(), 1);
        assert_eq!(
            remove_group_member(&pool, &group.id, &member).await.unwrap(),
            MemberRemoval::Removed
        );
        assert_eq!(
            remove_group_member(&pool, &group.id, &member).await.unwrap(),
            MemberRemoval::NotMember
        );
        assert_eq!(
            remove_group_member(&pool, &group.id, &admin).await.unwrap(),
            MemberRemoval::LastAdmin
        );
        assert!(get_group_member(&pool, &group.id, &member).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_user_groups() {
        let (pool, admin, member) = setup().await;
        create_group(&pool, new_group(&admin, vec![member.clone()])).await.unwrap();
        create_group(&pool, new_group(&admin, vec![])).await.unwrap();

        assert_eq!(list_user_groups(&pool, &admin).await.unwrap().len(), 2);
        assert_eq!(list_user_groups(&pool, &member).await.unwrap().len(), 1);
    }
}
