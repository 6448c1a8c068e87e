//! Random move sequences against the board service
//!
//! A plain `Vec<Vec<Uuid>>` model replays every move; the store and a client
//! view fed only by broadcast events must both end up matching it.

use crate::common::{drain, TestApp};
use boardsync::client::BoardView;
use boardsync::shared::ledger::is_dense;
use boardsync::shared::model::MoveCardRequest;
use boardsync::shared::ServerEvent;
use proptest::prelude::*;
use uuid::Uuid;

fn apply_to_model(model: &mut [Vec<Uuid>], card: Uuid, target: usize, index: i64) {
    let (from, at) = model
        .iter()
        .enumerate()
        .find_map(|(c, cards)| cards.iter().position(|id| *id == card).map(|i| (c, i)))
        .expect("card in model");
    model[from].remove(at);
    let len = model[target].len() as i64;
    model[target].insert(index.clamp(0, len) as usize, card);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_move_sequences_converge(
        counts in prop::collection::vec(0usize..5, 3),
        moves in prop::collection::vec((any::<prop::sample::Index>(), 0usize..3, -1i64..7), 1..20),
    ) {
        prop_assume!(counts.iter().sum::<usize>() > 0);

        tokio_test::block_on(async {
            let app = TestApp::new();
            let seeded = app.seed(Uuid::new_v4(), &counts).await;
            let mut model = seeded.cards.clone();
            let all: Vec<Uuid> = model.iter().flatten().copied().collect();

            let snapshot = app.state.boards.get_board(seeded.owner, seeded.board_id).await.unwrap();
            let mut view = BoardView::new(snapshot);
            let (conn, mut events) = app.state.realtime.connect(seeded.owner, None).await;
            app.state
                .realtime
                .join(conn.connection_id, seeded.owner, seeded.board_id)
                .await
                .unwrap();
            drain(&mut events);

            for (pick, target, index) in &moves {
                let card = all[pick.index(all.len())];
                app.state
                    .boards
                    .move_card(
                        seeded.owner,
                        MoveCardRequest::new(card, seeded.columns[*target], *index),
                    )
                    .await
                    .unwrap();
                apply_to_model(&mut model, card, *target, *index);

                for event in drain(&mut events) {
                    if let ServerEvent::Change(change) = event {
                        view.apply_event(&change);
                    }
                }
            }

            for (column, expected) in seeded.columns.iter().zip(&model) {
                assert_eq!(&app.order(*column).await, expected);
                assert!(is_dense(app.positions(*column).await));
                assert_eq!(view.card_order(*column).as_ref(), Some(expected));
            }
        });
    }
}
