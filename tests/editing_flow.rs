//! End-to-end editing: edits, debounced rendering, replace-all and the CLI
//! host run.

use std::time::Duration;

use livemark::app::{App, Message, Model, update};
use livemark::document::Document;
use livemark::render::{ExtensionSet, render};
use livemark::scheduler::{ManualClock, RenderOutcome};
use livemark::session::SessionStore;

const FIXTURE: &str = include_str!("fixtures/sample.md");

fn model_with_clock(text: &str) -> (Model, ManualClock) {
    let clock = ManualClock::new();
    let model = Model::new(Document::from_text(text)).with_clock(Box::new(clock.clone()));
    (model, clock)
}

#[test]
fn test_fixture_renders_every_extension() {
    let html = render(FIXTURE).unwrap();
    assert!(html.contains("<div class=\"toc\">"));
    assert!(html.contains("id=\"overview\""));
    assert!(html.contains("class=\"lead\""));
    assert!(html.contains("<p class=\"intro\">"));
    assert!(html.contains("<abbr title=\"Hyper Text Markup Language\">HTML</abbr>"));
    assert!(!html.contains("*[HTML]"));
    assert!(html.contains("<table>"));
    assert!(!html.contains("[TOC]"));
}

#[test]
fn test_typing_session_renders_latest_text_once() {
    let (mut model, clock) = model_with_clock("");
    let mut typed = String::new();
    for ch in "# Title".chars() {
        typed.push(ch);
        model = update(model, Message::Edit(typed.clone()));
        clock.advance(Duration::from_millis(50));
        assert_eq!(model.poll_render(), None);
    }

    clock.advance(Duration::from_millis(300));
    assert_eq!(model.poll_render(), Some(RenderOutcome::Rendered));
    assert_eq!(model.scheduler.render_count(), 1);
    assert!(model.preview.content().unwrap().contains("Title</h1>"));
}

#[test]
fn test_replace_all_keeps_scroll_on_same_text() {
    let (model, _clock) = model_with_clock("a\nb\na\nb\nTARGET\n");
    let model = update(model, Message::ScrollTo(8));
    let model = update(
        model,
        Message::ReplaceAll {
            query: "a".to_string(),
            replacement: "aaaa".to_string(),
        },
    );

    let text = model.document.text();
    assert_eq!(text, "aaaa\nb\naaaa\nb\nTARGET\n");
    assert_eq!(&text[model.document.scroll_anchor()..], "TARGET\n");

    let model = update(model, Message::Undo);
    assert_eq!(model.document.text(), "a\nb\na\nb\nTARGET\n");
}

#[test]
fn test_cli_run_replaces_writes_and_renders() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("doc.md");
    let out = dir.path().join("preview.html");
    let session = dir.path().join("session.json");
    std::fs::write(&doc, "teh cat sat on teh mat\n").unwrap();

    App::new(Some(doc.clone()))
        .with_session(SessionStore::new(&session))
        .with_output(Some(out.clone()))
        .with_replace_all("teh".to_string(), "the".to_string())
        .with_write(true)
        .with_extensions(ExtensionSet::standard())
        .run()
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&doc).unwrap(),
        "the cat sat on the mat\n"
    );
    let html = std::fs::read_to_string(&out).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<p>the cat sat on the mat</p>"));

    let record = SessionStore::new(&session).restore().unwrap();
    assert_eq!(record.last_file, Some(doc));
}

#[test]
fn test_cli_write_without_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = App::new(None)
        .with_session(SessionStore::new(dir.path().join("session.json")))
        .with_output(Some(dir.path().join("out.html")))
        .with_write(true)
        .run();
    assert!(result.is_err());
}
