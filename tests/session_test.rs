//! Tests for the game session state machine.

use chess_sessions::{
    Board, BotConfig, Color, GameResult, GameSession, GameStatus, SessionErrorKind, StatusNote,
};

const WHITE: u64 = 10;
const BLACK: u64 = 20;
const CHANNEL: u64 = 99;

fn new_session() -> GameSession {
    GameSession::new(WHITE, BLACK, CHANNEL).expect("Distinct players")
}

#[test]
fn test_queen_capture_on_f7_is_check_not_mate() {
    let mut session = new_session();
    for m in ["e4", "e5", "Qh5", "Nc6"] {
        let report = session.apply_move(m).expect("Legal move");
        assert_eq!(*report.note(), StatusNote::Quiet);
    }

    let report = session.apply_move("Qxf7").expect("Legal capture");
    assert_eq!(*report.note(), StatusNote::Check);
    assert_eq!(report.short(), "Qxf7+");
    assert_eq!(report.note().to_string(), "Check!");
    assert!(session.board().is_check());
    assert_eq!(session.status(), GameStatus::Active);
    assert_eq!(session.result(), None);
}

#[test]
fn test_fools_mate_finishes_for_black() {
    let mut session = new_session();
    for m in ["f3", "e5", "g4"] {
        session.apply_move(m).expect("Legal move");
    }
    let report = session.apply_move("Qh4").expect("Legal move");

    assert_eq!(
        *report.note(),
        StatusNote::Checkmate {
            winner: Color::Black
        }
    );
    assert_eq!(report.short(), "Qh4#");
    assert_eq!(session.status(), GameStatus::Finished(GameResult::BlackWin));
    assert_eq!(session.moves(), ["f2f3", "e7e5", "g2g4", "d8h4"]);
}

#[test]
fn test_smothered_mate_from_constructed_position() {
    let config = BotConfig::default();
    let mut session = GameSession::from_fen(
        WHITE,
        BLACK,
        CHANNEL,
        "6rk/p5pp/8/6N1/8/8/8/K7 b - - 0 1",
        &config,
    )
    .expect("Legal position");

    assert_eq!(session.current_turn_player(), BLACK);
    session.apply_move("a6").expect("Legal move");
    let report = session.apply_move("Nf7").expect("Legal move");

    assert_eq!(
        *report.note(),
        StatusNote::Checkmate {
            winner: Color::White
        }
    );
    assert_eq!(session.result(), Some(GameResult::WhiteWin));

    let record = session.export_record().expect("Replayable log");
    assert!(record.contains("1... a6 2. Nf7#"));
    assert!(record.contains("[SetUp \"1\"]"));
    assert!(record.contains("[FEN \"6rk/p5pp/8/6N1/8/8/8/K7 b - - 0 1\"]"));
    assert!(record.contains("[Result \"1-0\"]"));
}

#[test]
fn test_stalemate_is_a_draw() {
    let config = BotConfig::default();
    let mut session =
        GameSession::from_fen(WHITE, BLACK, CHANNEL, "7k/8/8/6Q1/8/8/8/K7 w - - 0 1", &config)
            .expect("Legal position");

    let report = session.apply_move("Qg6").expect("Legal move");
    assert_eq!(*report.note(), StatusNote::Stalemate);
    assert_eq!(session.result(), Some(GameResult::Draw));
}

#[test]
fn test_insufficient_material_is_a_draw() {
    let config = BotConfig::default();
    let mut session =
        GameSession::from_fen(WHITE, BLACK, CHANNEL, "7k/8/8/8/8/8/r7/KN6 w - - 0 1", &config)
            .expect("Legal position");

    let report = session.apply_move("Kxa2").expect("Legal capture");
    assert_eq!(*report.note(), StatusNote::InsufficientMaterial);
    assert_eq!(
        report.note().to_string(),
        "Draw due to insufficient material."
    );
    assert_eq!(session.result(), Some(GameResult::Draw));
}

#[test]
fn test_long_short_and_castling_notations_accepted() {
    let mut session = new_session();
    session.apply_move("e2e4").expect("Long notation");
    session.apply_move("e5").expect("Short notation");
    session.apply_move("g1f3").expect("Long notation");
    session.apply_move("Nc6").expect("Short notation");
    session.apply_move("f1c4").expect("Long notation");
    session.apply_move("Bc5").expect("Short notation");

    let report = session.apply_move("o-o").expect("Castling alias");
    assert_eq!(report.long(), "e1g1");

    session.apply_move("d6").expect("Short notation");
    session.apply_move("d3").expect("Short notation");
    session.apply_move("Be6").expect("Short notation");
    session.apply_move("Nc3").expect("Short notation");
    session.apply_move("Qd7").expect("Short notation");
    session.apply_move("a3").expect("Short notation");

    let report = session.apply_move("0-0-0").expect("Castling alias");
    assert_eq!(report.long(), "e8c8");
    assert_eq!(report.short(), "O-O-O");
}

#[test]
fn test_invalid_move_leaves_session_unchanged() {
    let mut session = new_session();
    session.apply_move("e4").expect("Legal move");
    let before = session.snapshot();

    for bad in ["e5e6", "Ke3", "zz", "", "O-O"] {
        let err = session.apply_move(bad).expect_err("Should be refused");
        assert!(matches!(err.kind(), SessionErrorKind::InvalidMove { .. }));
        assert!(err.kind().to_string().contains("'e2e4'"));
    }

    assert_eq!(session.snapshot(), before);
}

#[test]
fn test_finished_session_refuses_moves() {
    let mut session = new_session();
    assert!(session.resign(WHITE));
    assert_eq!(session.result(), Some(GameResult::BlackWin));

    let err = session.apply_move("e4").expect_err("Game is over");
    assert_eq!(err.kind(), &SessionErrorKind::GameOver);
    assert!(session.moves().is_empty());
    assert_eq!(session.status(), GameStatus::Finished(GameResult::BlackWin));
}

#[test]
fn test_resign_rules() {
    let mut session = new_session();
    assert!(!session.resign(12345), "Non-participant cannot resign");
    assert!(session.is_active());

    assert!(session.resign(BLACK));
    assert_eq!(session.result(), Some(GameResult::WhiteWin));

    assert!(!session.resign(WHITE), "Already finished");
    assert_eq!(session.result(), Some(GameResult::WhiteWin));
}

#[test]
fn test_turn_tracking() {
    let mut session = new_session();
    assert_eq!(session.current_turn_player(), WHITE);
    assert!(session.is_turn_of(WHITE));
    assert!(!session.is_turn_of(BLACK));

    session.apply_move("d4").expect("Legal move");
    assert_eq!(session.current_turn_player(), BLACK);
    assert!(session.is_turn_of(BLACK));
    assert!(!session.is_turn_of(777));
}

#[test]
fn test_apply_move_as_checks_membership_and_turn() {
    let mut session = new_session();

    let err = session.apply_move_as(5, "e4").expect_err("Outsider");
    assert_eq!(err.kind(), &SessionErrorKind::NotParticipant);

    let err = session.apply_move_as(BLACK, "e5").expect_err("Out of turn");
    assert_eq!(err.kind(), &SessionErrorKind::NotYourTurn);
    assert!(session.moves().is_empty());

    session.apply_move_as(WHITE, "e4").expect("White to move");
    session.apply_move_as(BLACK, "e5").expect("Black to move");
    assert_eq!(session.moves().len(), 2);
}

#[test]
fn test_replaying_log_reproduces_board() {
    let mut session = new_session();
    for m in ["d4", "Nf6", "c4", "e6", "Nc3", "Bb4", "Qc2", "O-O", "a3", "Bxc3+", "Qxc3"] {
        session.apply_move(m).expect("Legal move");
    }

    let replayed = Board::replay(None, session.moves()).expect("Replayable log");
    assert_eq!(replayed.fen(), session.board().fen());
}

#[test]
fn test_last_move_time_advances_only_on_success() {
    let mut session = new_session();
    let created = session.created_at();
    assert_eq!(session.last_move_at(), created);

    let _ = session.apply_move("nonsense");
    assert_eq!(session.last_move_at(), created);

    session.apply_move("e4").expect("Legal move");
    assert!(session.last_move_at() >= created);
    assert_eq!(session.created_at(), created);
}

#[test]
fn test_same_player_refused() {
    let err = GameSession::new(3, 3, CHANNEL).expect_err("Same player");
    assert_eq!(err.kind(), &SessionErrorKind::SamePlayer);
}

#[test]
fn test_engine_and_suggestions_leave_board_untouched() {
    let mut session = new_session();
    session.apply_move("e4").expect("Legal move");
    let before = session.board().fen();

    let suggestions = session.suggestions(3);
    assert_eq!(suggestions.len(), 3);
    let engine = session.engine_move().expect("Black has moves");
    assert!(!engine.is_empty());

    assert_eq!(session.board().fen(), before);
    assert_eq!(session.board().pushed_len(), 0);
    assert_eq!(session.moves().len(), 1);
}

#[test]
fn test_snapshot_restore_round_trip() {
    let config = BotConfig::default();
    let mut session = new_session();
    for m in ["e4", "c5", "Nf3", "d6"] {
        session.apply_move(m).expect("Legal move");
    }

    let snapshot = session.snapshot();
    assert_eq!(snapshot.current_turn, "white");
    let json = serde_json::to_string(&snapshot).expect("Serialisable");
    let parsed = serde_json::from_str(&json).expect("Deserialisable");
    assert_eq!(snapshot, parsed);

    let restored = GameSession::restore(&parsed, &config).expect("Consistent snapshot");
    assert_eq!(restored.id(), session.id());
    assert_eq!(restored.board().fen(), session.board().fen());
    assert_eq!(restored.moves(), session.moves());
    assert_eq!(restored.status(), session.status());
}

#[test]
fn test_restore_rejects_tampered_snapshot() {
    let config = BotConfig::default();
    let mut session = new_session();
    session.apply_move("e4").expect("Legal move");

    let mut snapshot = session.snapshot();
    snapshot.move_history.push("e7e5".to_string());
    let err = GameSession::restore(&snapshot, &config).expect_err("FEN mismatch");
    assert!(matches!(err.kind(), SessionErrorKind::CorruptRecord(_)));

    let mut snapshot = session.snapshot();
    snapshot.result = Some(GameResult::Draw);
    let err = GameSession::restore(&snapshot, &config).expect_err("Status mismatch");
    assert!(matches!(err.kind(), SessionErrorKind::CorruptRecord(_)));
}

#[test]
fn test_accepted_moves_leave_no_undo_history() {
    let mut session = new_session();
    for m in ["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"] {
        session.apply_move(m).expect("Legal move");
    }
    assert_eq!(session.board().pushed_len(), 0);

    // A stray pop on a copy of the live board cannot take back a real move.
    let mut copy = session.board().clone();
    assert_eq!(copy.pop(), None);
    assert_eq!(copy.fen(), session.board().fen());
}
