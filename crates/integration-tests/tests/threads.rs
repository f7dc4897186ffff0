use fl_core::{CommentRepo, Role, ThreadRepo};
use fl_services::NewComment;
use integration_tests::World;

#[tokio::test]
async fn concurrent_first_posts_share_one_thread() -> anyhow::Result<()> {
    let w = World::new().await?;
    let staff = w.actor(Role::Staff).await?;
    let f = w.farm_record(&staff).await?;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let engine = w.services.comments.clone();
        let actor = staff;
        tasks.push(tokio::spawn(async move {
            engine.create_comment(&actor, NewComment::new(f, format!("laporan {i}"))).await
        }));
    }

    let mut thread_ids = Vec::new();
    for task in tasks {
        thread_ids.push(task.await??.thread_id);
    }
    thread_ids.dedup();
    assert_eq!(thread_ids.len(), 1);

    let thread = w.repo.find_thread(f).await?.unwrap();
    assert_eq!(thread.id, thread_ids[0]);
    assert_eq!(thread.created_by, staff.id);
    assert_eq!(w.repo.list_comments(thread.id).await?.len(), 8);
    Ok(())
}

#[tokio::test]
async fn get_or_create_is_idempotent() -> anyhow::Result<()> {
    let w = World::new().await?;
    let staff = w.actor(Role::Staff).await?;
    let admin = w.actor(Role::Admin).await?;
    let f = w.farm_record(&staff).await?;

    let first = w.services.threads.get_or_create_thread(f, staff.id).await?;
    let again = w.services.threads.get_or_create_thread(f, admin.id).await?;
    assert_eq!(first.id, again.id);
    assert_eq!(again.created_by, staff.id);
    Ok(())
}

#[tokio::test]
async fn landing_thread_prefers_latest_record() -> anyhow::Result<()> {
    let w = World::new().await?;
    let staff = w.actor(Role::Staff).await?;
    let supervisor = w.actor(Role::Supervisor).await?;
    let reader = w.actor(Role::User).await?;
    let engine = &w.services.comments;

    assert!(engine.landing_thread(&staff).await?.thread.is_none());
    assert!(engine.landing_thread(&supervisor).await?.thread.is_none());

    let older = w.farm_record_dated(&staff, 3).await?;
    let c_old = engine.create_comment(&staff, NewComment::new(older, "minggu lalu")).await?;

    // newest record has no thread yet: fall back to the older record's thread
    let newest = w.farm_record_dated(&staff, 0).await?;
    let landing = engine.landing_thread(&staff).await?;
    assert_eq!(landing.thread.as_ref().map(|t| t.id), Some(c_old.thread_id));
    assert!(landing.can_post);

    let c_new = engine.create_comment(&staff, NewComment::new(newest, "hari ini")).await?;
    let landing = engine.landing_thread(&staff).await?;
    assert_eq!(landing.thread.as_ref().map(|t| t.id), Some(c_new.thread_id));
    assert_eq!(landing.comments.len(), 1);

    // moderators without records see the newest farm thread anywhere
    let landing = engine.landing_thread(&supervisor).await?;
    assert_eq!(landing.thread.map(|t| t.id), Some(c_new.thread_id));

    assert!(engine.landing_thread(&reader).await?.thread.is_none());
    Ok(())
}
