use fl_core::{AppError, CommentStatus, PinState, Role, ThreadRepo};
use fl_services::NewComment;
use integration_tests::World;

#[tokio::test]
async fn pin_toggles_and_swaps() -> anyhow::Result<()> {
    let w = World::new().await?;
    let admin = w.actor(Role::Admin).await?;
    let staff = w.actor(Role::Staff).await?;
    let f = w.farm_record(&staff).await?;
    let engine = &w.services.comments;
    let moderation = &w.services.moderation;

    let c1 = engine.create_comment(&admin, NewComment::new(f, "Jadwal vaksin")).await?;
    let c2 = engine.create_comment(&admin, NewComment::new(f, "Jadwal panen")).await?;

    assert_eq!(moderation.toggle_pin(&admin, c1.id).await?, PinState::Pinned);
    let thread = w.repo.get_thread(c1.thread_id).await?.unwrap();
    assert_eq!(thread.pinned_comment_id, Some(c1.id));

    assert_eq!(moderation.toggle_pin(&admin, c2.id).await?, PinState::Pinned);
    let view = engine.visible_comments(&admin, f).await?;
    let pinned: Vec<_> = view.flatten().into_iter().filter(|c| c.is_pinned).map(|c| c.id).collect();
    assert_eq!(pinned, vec![c2.id]);
    assert_eq!(view.thread.unwrap().pinned_comment_id, Some(c2.id));

    assert_eq!(moderation.toggle_pin(&admin, c2.id).await?, PinState::Unpinned);
    let view = engine.visible_comments(&admin, f).await?;
    assert!(view.flatten().iter().all(|c| !c.is_pinned));
    assert_eq!(view.thread.unwrap().pinned_comment_id, None);
    Ok(())
}

#[tokio::test]
async fn only_admin_pins_and_locks() -> anyhow::Result<()> {
    let w = World::new().await?;
    let supervisor = w.actor(Role::Supervisor).await?;
    let staff = w.actor(Role::Staff).await?;
    let f = w.farm_record(&staff).await?;
    let c = w.services.comments.create_comment(&staff, NewComment::new(f, "Lampu kandang mati")).await?;

    let err = w.services.moderation.toggle_pin(&supervisor, c.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let err = w.services.moderation.set_lock(&supervisor, c.thread_id, true).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    Ok(())
}

#[tokio::test]
async fn status_moves_freely_for_moderators() -> anyhow::Result<()> {
    let w = World::new().await?;
    let supervisor = w.actor(Role::Supervisor).await?;
    let staff = w.actor(Role::Staff).await?;
    let f = w.farm_record(&staff).await?;
    let c = w.services.comments.create_comment(&staff, NewComment::new(f, "Butuh obat")).await?;

    let err = w.services.moderation.set_status(&staff, c.id, CommentStatus::Approved).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    for status in [CommentStatus::Approved, CommentStatus::Rejected, CommentStatus::Pending, CommentStatus::Approved] {
        let updated = w.services.moderation.set_status(&supervisor, c.id, status).await?;
        assert_eq!(updated.status, status);
    }
    Ok(())
}

#[tokio::test]
async fn lock_blocks_posting_but_not_listing() -> anyhow::Result<()> {
    let w = World::new().await?;
    let admin = w.actor(Role::Admin).await?;
    let staff = w.actor(Role::Staff).await?;
    let f = w.farm_record(&staff).await?;
    let engine = &w.services.comments;

    let first = engine.create_comment(&staff, NewComment::new(f, "Sebelum dikunci")).await?;
    let thread = w.services.moderation.set_lock_for_comment(&admin, first.id, true).await?;
    assert!(thread.is_locked);

    let err = engine.create_comment(&staff, NewComment::new(f, "Sesudah")).await.unwrap_err();
    assert!(matches!(err, AppError::Locked(_)));
    let err = engine
        .create_comment(&staff, NewComment::new(f, "Balasan").reply_to(first.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Locked(_)));

    assert_eq!(engine.visible_comments(&staff, f).await?.flatten().len(), 1);

    // admins still post into locked threads
    engine.create_comment(&admin, NewComment::new(f, "Catatan admin")).await?;

    let landing = engine.landing_thread(&staff).await?;
    assert!(!landing.can_post);
    assert!(engine.landing_thread(&admin).await?.can_post);

    w.services.moderation.set_lock(&admin, thread.id, false).await?;
    engine.create_comment(&staff, NewComment::new(f, "Dibuka lagi")).await?;
    Ok(())
}
