//! End-to-end journey scenarios against the scripted catalog site.
//!
//! Every test runs on tokio's paused clock, so the 10-30 second bounded
//! waits inside the journey complete instantly.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::time::Duration;
use stepwise::prelude::*;

fn learner() -> Credentials {
    Credentials::new("learner@example.com", "correct horse")
}

async fn open(site: &StepikSimulation) -> (Session<MockDriver>, MockDriver) {
    let driver = site.build();
    let observer = driver.clone();
    let session = Session::open(driver, JourneyConfig::default())
        .await
        .expect("session should open");
    (session, observer)
}

// ============================================================================
// Happy path: search, free filter, visible cards
// ============================================================================

#[tokio::test(start_paused = true)]
async fn free_filter_leaves_visible_python_cards() {
    let (session, _observer) = open(&StepikSimulation::new()).await;
    let tab = session.origin_tab();

    let catalog = LoginPage::new(tab.clone()).login(&learner()).await.unwrap();
    let results = catalog.search("python").await.unwrap();
    assert!(tab.url().await.unwrap().contains("q=python"));

    let filtered = results.apply_free_filter().await.unwrap();
    assert!(tab.url().await.unwrap().contains("free=true"));
    let render = filtered.render_check();
    assert!(render.passed());
    assert!(render.diagnostic().elapsed_ms <= 15_000);
    assert!(tab.count(&stepwise::pages::locators::result_card()).await.unwrap() >= 1);

    session.close().await.unwrap();
}

// ============================================================================
// Stale auth-intent parameter
// ============================================================================

#[tokio::test(start_paused = true)]
async fn stale_auth_recovered_exactly_once() {
    let site = StepikSimulation::new().stale_auth(StaleAuth::UntilCookiesCleared);
    let (session, observer) = open(&site).await;

    let catalog = LoginPage::new(session.origin_tab())
        .login(&learner())
        .await
        .unwrap();

    assert_eq!(observer.cookies_cleared(), 1);
    assert_eq!(
        catalog.login_outcome().unwrap().recovery,
        LoginRecovery::CookiesCleared
    );
    let url = session.origin_tab().url().await.unwrap();
    assert!(!url.contains("auth=login"), "still stale: {url}");
    assert!(catalog.is_loaded().await);

    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn persistent_auth_intent_is_fatal() {
    let journey = FreeCourseJourney::new("python", learner()).unwrap();
    let driver = StepikSimulation::new().stale_auth(StaleAuth::Always).build();
    let observer = driver.clone();

    let outcome = journey
        .run_scoped(driver, JourneyConfig::default())
        .await
        .unwrap();

    assert!(matches!(
        outcome.result,
        Err(JourneyError::RecoveryExhausted { .. })
    ));
    assert_eq!(observer.cookies_cleared(), 1);
    assert!(!observer.was_called("press"));
    assert!(observer.is_closed());
}

// ============================================================================
// Nothing left after filtering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn empty_filter_is_structural_absence_on_open() {
    let site = StepikSimulation::new().free_results(0);
    let (session, _observer) = open(&site).await;

    let filtered = LoginPage::new(session.origin_tab())
        .login(&learner())
        .await
        .unwrap()
        .search("python")
        .await
        .unwrap()
        .apply_free_filter()
        .await
        .unwrap();

    let start = tokio::time::Instant::now();
    let err = filtered.open_first_course().await.unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(1));
    match err {
        JourneyError::StructuralAbsence { what, .. } => assert_eq!(what, "no result cards"),
        other => panic!("expected structural absence, got {other}"),
    }

    session.close().await.unwrap();
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test(start_paused = true)]
async fn login_never_ends_on_auth_intent_url() {
    for stale in [StaleAuth::Never, StaleAuth::UntilCookiesCleared] {
        for redirect in [Some(Duration::from_millis(800)), None] {
            let site = StepikSimulation::new()
                .stale_auth(stale)
                .redirect_after_login(redirect);
            let (session, _observer) = open(&site).await;
            LoginPage::new(session.origin_tab())
                .login(&learner())
                .await
                .unwrap();
            let url = session.origin_tab().url().await.unwrap();
            assert!(url.ends_with("/catalog"), "{stale:?}/{redirect:?}: {url}");
            assert!(!url.contains("auth=login"));
            session.close().await.unwrap();
        }
    }
}

#[tokio::test(start_paused = true)]
async fn is_loaded_is_idempotent() {
    let (session, _observer) = open(&StepikSimulation::new()).await;
    let results = LoginPage::new(session.origin_tab())
        .login(&learner())
        .await
        .unwrap()
        .search("machine learning")
        .await
        .unwrap();

    let first = results.is_loaded().await;
    let second = results.is_loaded().await;
    assert!(first);
    assert_eq!(first, second);

    let url = session.origin_tab().url().await.unwrap();
    assert_eq!(
        stepwise::url_pattern::query_param(&url, "q").as_deref(),
        Some("machine learning")
    );
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn empty_search_results_fail_fast_on_filter() {
    let site = StepikSimulation::new().results(0);
    let (session, _observer) = open(&site).await;
    let results = LoginPage::new(session.origin_tab())
        .login(&learner())
        .await
        .unwrap()
        .search("zzzzqqq")
        .await
        .unwrap();

    let err = results.apply_free_filter().await.unwrap_err();
    assert!(err.is_structural_absence());
    assert!(!err.is_unconverged());
    session.close().await.unwrap();
}

// ============================================================================
// Failure modes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn dropped_search_term_is_unconverged_with_diagnostic() {
    let journey = FreeCourseJourney::new("python", learner()).unwrap();
    let driver = StepikSimulation::new().echo_query(false).build();
    let outcome = journey
        .run_scoped(driver, JourneyConfig::default())
        .await
        .unwrap();

    let err = outcome.result.unwrap_err();
    assert!(err.is_unconverged());
    let diagnostic = err.verification().unwrap().diagnostic();
    assert_eq!(diagnostic.state, JourneyState::SearchResults);
    assert_eq!(diagnostic.outcome, WaitOutcome::TimedOut);
    assert!(diagnostic.url.contains("/catalog/search"));

    let failed = outcome.report.steps.last().unwrap();
    assert_eq!(failed.state, JourneyState::Failed);
    assert!(failed.verification.is_some());
}

#[tokio::test(start_paused = true)]
async fn missing_login_form_is_structural_absence() {
    let journey = FreeCourseJourney::new("python", learner()).unwrap();
    let driver = StepikSimulation::new().without_login_form().build();
    let observer = driver.clone();
    let outcome = journey
        .run_scoped(driver, JourneyConfig::default())
        .await
        .unwrap();

    assert!(outcome.result.unwrap_err().is_structural_absence());
    assert!(outcome.report.steps.iter().all(|s| s.state == JourneyState::Failed));
    assert_eq!(observer.cookies_cleared(), 0);
}

#[tokio::test(start_paused = true)]
async fn course_opened_in_place_completes_journey() {
    let journey = FreeCourseJourney::new("python", learner()).unwrap();
    let driver = StepikSimulation::new().course_in_new_tab(false).build();
    let outcome = journey
        .run_scoped(driver, JourneyConfig::default())
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.report.final_state, JourneyState::CourseOpened);
    assert!(outcome
        .report
        .final_url
        .as_deref()
        .unwrap()
        .contains("/course/58852"));
}

#[tokio::test(start_paused = true)]
async fn custom_base_url_is_followed() {
    let config = JourneyConfig::default().base_url("https://staging.stepik.test/");
    let journey = FreeCourseJourney::new("rust", learner()).unwrap();
    let driver = StepikSimulation::new().config(&config).build();
    let observer = driver.clone();
    let outcome = journey.run_scoped(driver, config).await.unwrap();

    assert!(outcome.is_success(), "{:?}", outcome.result);
    assert!(observer.was_called("navigate:https://staging.stepik.test/catalog?auth=login"));
}
