// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S6: kanban mutations that omit the target list fail explicitly,
//! enumerating the six allowed lists.

use super::support::Env;
use sb_adapters::FakeAgentFacade;
use sb_core::AgentResult;
use sb_daemon::surface::CreateCardRequest;
use sb_kanban::DEFAULT_LISTS;

#[tokio::test]
async fn create_card_without_list_is_an_explicit_400() {
    let env = Env::new(FakeAgentFacade::completing(AgentResult::default()), false);

    let err = env
        .surface
        .create_card(
            None,
            CreateCardRequest { title: "floating card".to_string(), ..CreateCardRequest::default() },
        )
        .unwrap_err();

    assert_eq!(err.status(), 400);
    let message = err.to_string();
    for list in DEFAULT_LISTS {
        assert!(message.contains(list), "expected {list} in error: {message}");
    }

    // No card created, no history row.
    let core = env.core();
    assert!(core.kanban.cards(None).unwrap().is_empty());
}

#[tokio::test]
async fn explicit_list_is_honored() {
    let env = Env::new(FakeAgentFacade::completing(AgentResult::default()), false);
    let core = env.core();
    let fazer = core.kanban.list_by_name("A Fazer").unwrap();

    let card = env
        .surface
        .create_card(
            None,
            CreateCardRequest {
                list_id: Some(fazer.id),
                title: "planned work".to_string(),
                ..CreateCardRequest::default()
            },
        )
        .unwrap();

    assert_eq!(card.list_id, fazer.id);
    let history = core.kanban.history(card.id).unwrap();
    assert_eq!(history.len(), 1);
}
