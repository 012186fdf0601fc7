use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::CreateQrRequest,
    repo::QrRepo,
    repo_types::{NewQrRecord, QrRecord},
};
use crate::{
    auth::{Identity, Role},
    error::{AppError, AppResult},
};

/// Outcome of a successful delete.
#[derive(Debug, PartialEq, Eq)]
pub struct Deleted {
    pub id: Uuid,
}

/// Persists a record owned by the caller. Role plays no part here.
pub async fn create(repo: &dyn QrRepo, caller: Identity, req: CreateQrRequest) -> AppResult<QrRecord> {
    let CreateQrRequest { title, content, image } = req;
    if content.trim().is_empty() || image.trim().is_empty() {
        return Err(AppError::Validation("Content and image are required.".into()));
    }
    let title = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    let record = repo
        .insert(NewQrRecord {
            owner_id: caller.user_id,
            title,
            content,
            image,
        })
        .await?;
    info!(qr_id = %record.id, owner_id = %record.owner_id, "qr code saved");
    Ok(record)
}

pub async fn list_own(repo: &dyn QrRepo, caller: Identity) -> AppResult<Vec<QrRecord>> {
    repo.list_by_owner(caller.user_id).await
}

pub async fn list_all(repo: &dyn QrRepo, caller_role: Role) -> AppResult<Vec<QrRecord>> {
    match caller_role {
        Role::Admin => repo.list_all().await,
        Role::User => Err(AppError::Forbidden("Access denied, admin only.".into())),
    }
}

/// Owner or any admin may delete. A second delete of the same record is `NotFound`.
pub async fn delete(repo: &dyn QrRepo, caller: Identity, record_id: Uuid) -> AppResult<Deleted> {
    let record = repo
        .find(record_id)
        .await?
        .ok_or_else(|| AppError::NotFound("QR Code not found.".into()))?;

    let permitted = match caller.role {
        Role::Admin => true,
        Role::User => record.owner_id == caller.user_id,
    };
    if !permitted {
        warn!(qr_id = %record_id, user_id = %caller.user_id, "delete of foreign qr code refused");
        return Err(AppError::Forbidden(
            "Not authorized to delete this QR Code.".into(),
        ));
    }

    // a concurrent delete may have won since the lookup
    if !repo.delete(record_id).await? {
        return Err(AppError::NotFound("QR Code not found.".into()));
    }
    info!(qr_id = %record_id, user_id = %caller.user_id, role = %caller.role, "qr code deleted");
    Ok(Deleted { id: record_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qrcodes::repo::MemoryQrRepo;

    fn ident(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    fn req(content: &str) -> CreateQrRequest {
        CreateQrRequest {
            title: Some("  Home page ".into()),
            content: content.into(),
            image: "data:image/png;base64,iVBORw0KGgo=".into(),
        }
    }

    #[tokio::test]
    async fn create_requires_content_and_image() {
        let repo = MemoryQrRepo::new();
        let u = ident(Role::User);
        assert!(matches!(
            create(&repo, u, req("  ")).await,
            Err(AppError::Validation(_))
        ));
        let mut no_image = req("hello");
        no_image.image = String::new();
        assert!(matches!(
            create(&repo, u, no_image).await,
            Err(AppError::Validation(_))
        ));
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_assigns_caller_as_owner_and_trims_title() {
        let repo = MemoryQrRepo::new();
        let u = ident(Role::Admin);
        let rec = create(&repo, u, req("https://example.com")).await.unwrap();
        assert_eq!(rec.owner_id, u.user_id);
        assert_eq!(rec.title.as_deref(), Some("Home page"));
    }

    #[tokio::test]
    async fn list_own_is_scoped_and_stable() {
        let repo = MemoryQrRepo::new();
        let (u, v) = (ident(Role::User), ident(Role::User));
        let a = create(&repo, u, req("a")).await.unwrap();
        create(&repo, v, req("b")).await.unwrap();
        let c = create(&repo, u, req("c")).await.unwrap();

        let first = list_own(&repo, u).await.unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![c.id, a.id]);
        assert_eq!(first, list_own(&repo, u).await.unwrap());
    }

    #[tokio::test]
    async fn list_all_is_admin_only() {
        let repo = MemoryQrRepo::new();
        create(&repo, ident(Role::User), req("a")).await.unwrap();
        create(&repo, ident(Role::User), req("b")).await.unwrap();

        assert!(matches!(
            list_all(&repo, Role::User).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(list_all(&repo, Role::Admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_enforces_ownership_then_reports_not_found() {
        let repo = MemoryQrRepo::new();
        let (owner, other) = (ident(Role::User), ident(Role::User));
        let rec = create(&repo, owner, req("mine")).await.unwrap();

        assert!(matches!(
            delete(&repo, other, rec.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(delete(&repo, owner, rec.id).await.unwrap(), Deleted { id: rec.id });
        assert!(matches!(
            delete(&repo, owner, rec.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn admin_deletes_any_record() {
        let repo = MemoryQrRepo::new();
        let rec = create(&repo, ident(Role::User), req("theirs")).await.unwrap();
        delete(&repo, ident(Role::Admin), rec.id).await.unwrap();
        assert!(repo.find(rec.id).await.unwrap().is_none());
    }
}
