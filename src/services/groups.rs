//! Group service.
//!
//! Groups have admins and members. Only admins add members; a member may
//! leave on their own, and a group always keeps at least one admin.

use tracing::info;

use crate::db::{self, DbPool, MemberRemoval, NewGroup};
use crate::error::{Error, Result};
use crate::models::{new_id, AddGroupMemberRequest, CreateGroupRequest, Group, GroupDto};

const MAX_GROUP_NAME_LEN: usize = 50;

#[derive(Clone)]
pub struct GroupService {
    db: DbPool,
}

impl GroupService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    async fn to_dto(&self, group: Group) -> Result<GroupDto> {
        let conversation_id = db::get_group_conversation(&self.db, &group.id)
            .await?
            .map(|c| c.id);
        let members = db::list_group_members(&self.db, &group.id).await?;
        Ok(GroupDto::new(group, conversation_id, members))
    }

    async fn require_admin(&self, group_id: &str, user_id: &str) -> Result<()> {
        match db::get_group_member(&self.db, group_id, user_id).await? {
            Some(member) if member.is_admin() => Ok(()),
            _ => Err(Error::Forbidden),
        }
    }

    /// Create a group owned by `creator`, with its group conversation.
    pub async fn create_group(&self, request: CreateGroupRequest, creator: &str) -> Result<GroupDto> {
        let group_name = request.group_name.trim().to_string();
        let name_len = group_name.chars().count();
        if name_len == 0 || name_len > MAX_GROUP_NAME_LEN {
            return Err(Error::InvalidInput(
                "Group name must be 1-50 characters".to_string(),
            ));
        }

        let mut members: Vec<String> = Vec::new();
        for member in request.members {
            let member = member.trim().to_string();
            if member.is_empty() || member == creator || members.contains(&member) {
                continue;
            }
            if !db::user_exists(&self.db, &member).await? {
                return Err(Error::NotFound(format!("User not found: {}", member)));
            }
            members.push(member);
        }

        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let (group, conversation) = db::create_group(
            &self.db,
            NewGroup {
                id: new_id(),
                group_name,
                description,
                created_by: creator.to_string(),
                members,
                conversation_id: new_id(),
            },
        )
        .await?;

        info!(
            group_id = %group.id,
            conversation_id = %conversation.id,
            created_by = %creator,
            "Created group"
        );

        let members = db::list_group_members(&self.db, &group.id).await?;
        Ok(GroupDto::new(group, Some(conversation.id), members))
    }

    /// Add a user to a group. Only group admins may add members.
    pub async fn add_user_to_group(
        &self,
        group_id: &str,
        request: AddGroupMemberRequest,
        actor: &str,
    ) -> Result<GroupDto> {
        let group = db::get_group(&self.db, group_id).await?;
        self.require_admin(group_id, actor).await?;

        if !db::user_exists(&self.db, &request.user_id).await? {
            return Err(Error::NotFound(format!("User not found: {}", request.user_id)));
        }

        db::add_group_member(&self.db, group_id, &request.user_id, request.role).await?;

        info!(
            group_id = %group_id,
            user_id = %request.user_id,
            role = request.role.as_str(),
            "Added group member"
        );

        self.to_dto(group).await
    }

    /// Remove a user from a group. Admins may remove anyone; members may
    /// remove themselves.
    pub async fn remove_user_from_group(
        &self,
        group_id: &str,
        user_id: &str,
        actor: &str,
    ) -> Result<GroupDto> {
        let group = db::get_group(&self.db, group_id).await?;

        if actor != user_id {
            self.require_admin(group_id, actor).await?;
        }

        match db::remove_group_member(&self.db, group_id, user_id).await? {
            MemberRemoval::Removed => {}
            MemberRemoval::NotMember => {
                return Err(Error::NotFound(format!(
                    "User {} is not a member of this group",
                    user_id
                )))
            }
            MemberRemoval::LastAdmin => {
                return Err(Error::InvalidInput(
                    "Cannot remove the last admin from the group".to_string(),
                ))
            }
        }

        info!(group_id = %group_id, user_id = %user_id, "Removed group member");

        self.to_dto(group).await
    }

    /// Get a group with its members. Only members may view it.
    pub async fn get_group_with_members(&self, group_id: &str, viewer: &str) -> Result<GroupDto> {
        let group = db::get_group(&self.db, group_id).await?;
        if db::get_group_member(&self.db, group_id, viewer).await?.is_none() {
            return Err(Error::Forbidden);
        }
        self.to_dto(group).await
    }

    pub async fn list_user_groups(&self, user_id: &str) -> Result<Vec<GroupDto>> {
        let groups = db::list_user_groups(&self.db, user_id).await?;
        let mut dtos = Vec::with_capacity(groups.len());
        for group in groups {
            dtos.push(self.to_dto(group).await?);
        }
        Ok(dtos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_user, sample_user, test_pool};
    use crate::models::GroupMemberType;

    struct Fixture {
        service: GroupService,
        admin: String,
        alice: String,
        bob: String,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let admin = create_user(&pool, sample_user("admin@example.com")).await.unwrap();
        let alice = create_user(&pool, sample_user("alice@example.com")).await.unwrap();
        let bob = create_user(&pool, sample_user("bob@example.com")).await.unwrap();
        Fixture {
            service: GroupService::new(pool),
            admin: admin.id,
            alice: alice.id,
            bob: bob.id,
        }
    }

    fn create_request(name: &str, members: Vec<String>) -> CreateGroupRequest {
        CreateGroupRequest {
            group_name: name.to_string(),
            description: Some("Study group".into()),
            members,
        }
    }

    fn add_request(user_id: &str, role: GroupMemberType) -> AddGroupMemberRequest {
        AddGroupMemberRequest {
            user_id: user_id.to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_create_group() {
        let f = fixture().await;
        let group = f
            .service
            .create_group(
                create_request("  Rust Learners ", vec![f.alice.clone(), f.alice.clone()]),
                &f.admin,
            )
            .await
            .unwrap();

        assert_eq!(group.group_name, "Rust Learners");
        assert_eq!(group.created_by, f.admin);
        assert!(group.conversation_id.is_some());
        assert_eq!(group.members.len(), 2);
        assert_eq!(group.members[0].role, GroupMemberType::Admin);
        assert_eq!(group.members[1].user_id, f.alice);
        assert_eq!(group.members[1].name, "Master Admin");
    }

    #[tokio::test]
    async fn test_group_name_length() {
        let f = fixture().await;
        let too_long = "x".repeat(51);
        for name in ["   ", too_long.as_str()] {
            let err = f
                .service
                .create_group(create_request(name, vec![]), &f.admin)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Group name must be 1-50 characters");
        }
        assert!(f
            .service
            .create_group(create_request(&"x".repeat(50), vec![]), &f.admin)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unknown_initial_member() {
        let f = fixture().await;
        let err = f
            .service
            .create_group(create_request("Group", vec!["ghost".into()]), &f.admin)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(f.service.list_user_groups(&f.admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_admins_add_members() {
        let f = fixture().await;
        let group = f
            .service
            .create_group(create_request("Group", vec![f.alice.clone()]), &f.admin)
            .await
            .unwrap();

        let err = f
            .service
            .add_user_to_group(&group.group_id, add_request(&f.bob, GroupMemberType::Member), &f.alice)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden));

        let updated = f
            .service
            .add_user_to_group(&group.group_id, add_request(&f.bob, GroupMemberType::Member), &f.admin)
            .await
            .unwrap();
        assert_eq!(updated.members.len(), 3);

        let dup = f
            .service
            .add_user_to_group(&group.group_id, add_request(&f.bob, GroupMemberType::Member), &f.admin)
            .await;
        assert!(matches!(dup, Err(Error::AlreadyExists(_))));

        let missing = f
            .service
            .add_user_to_group(&group.group_id, add_request("ghost", GroupMemberType::Member), &f.admin)
            .await;
        assert!(matches!(missing, Err(Error::NotFound(_))));

        let no_group = f
            .service
            .add_user_to_group("nope", add_request(&f.bob, GroupMemberType::Member), &f.admin)
            .await;
        assert!(matches!(no_group, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_rules() {
        let f = fixture().await;
        let group = f
            .service
            .create_group(
                create_request("Group", vec![f.alice.clone(), f.bob.clone()]),
                &f.admin,
            )
            .await
            .unwrap();
        let id = group.group_id.as_str();

        // A member cannot remove someone else.
        assert!(matches!(
            f.service.remove_user_from_group(id, &f.bob, &f.alice).await,
            Err(Error::Forbidden)
        ));

        // A member can leave.
        let after = f.service.remove_user_from_group(id, &f.alice, &f.alice).await.unwrap();
        assert_eq!(after.members.len(), 2);

        // Removing a non-member.
        assert!(matches!(
            f.service.remove_user_from_group(id, &f.alice, &f.admin).await,
            Err(Error::NotFound(_))
        ));

        // The last admin stays.
        let err = f
            .service
            .remove_user_from_group(id, &f.admin, &f.admin)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot remove the last admin from the group");

        // With a second admin the first may leave.
        f.service
            .add_user_to_group(id, add_request(&f.alice, GroupMemberType::Admin), &f.admin)
            .await
            .unwrap();
        assert!(f.service.remove_user_from_group(id, &f.admin, &f.admin).await.is_ok());
    }

    #[tokio::test]
    async fn test_simultaneous_admin_exits_keep_one_admin() {
        let f = fixture().await;
        let group = f
            .service
            .create_group(create_request("Group", vec![]), &f.admin)
            .await
            .unwrap();
        let id = group.group_id.as_str();
        f.service
            .add_user_to_group(id, add_request(&f.alice, GroupMemberType::Admin), &f.admin)
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            f.service.remove_user_from_group(id, &f.admin, &f.admin),
            f.service.remove_user_from_group(id, &f.alice, &f.alice),
        );

        assert_eq!(
            first.is_ok() as u8 + second.is_ok() as u8,
            1,
            "exactly one admin may leave"
        );
        let failed = first.err().or(second.err()).unwrap();
        assert_eq!(failed.to_string(), "Cannot remove the last admin from the group");

        let admins = db::count_group_admins(&f.service.db, id).await.unwrap();
        assert_eq!(admins, 1);
    }

    #[tokio::test]
    async fn test_only_members_view_group() {
        let f = fixture().await;
        let group = f
            .service
            .create_group(create_request("Group", vec![f.alice.clone()]), &f.admin)
            .await
            .unwrap();

        assert!(f.service.get_group_with_members(&group.group_id, &f.alice).await.is_ok());
        assert!(matches!(
            f.service.get_group_with_members(&group.group_id, &f.bob).await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            f.service.get_group_with_members("nope", &f.bob).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(f.service.list_user_groups(&f.alice).await.unwrap().len(), 1);
        assert!(f.service.list_user_groups(&f.bob).await.unwrap().is_empty());
    }
}
