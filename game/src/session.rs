use anyhow::Context;
use learn_game::board::Board;
use learn_game::{Game, LEARNER_MARK};
use std::io::{self, BufRead, Write};

/// Reads a cell number (1-9) until it names an empty cell. Taken cells and
/// garbage are reported and ignored.
pub fn read_move<R: BufRead>(input: &mut R, board: &Board, name: &str) -> io::Result<usize> {
    let available_moves = board.legal_actions();
    println!("{}, please, choose your move (1-9):", name);
    loop {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more input"));
        }
        match line.trim().parse::<usize>() {
            Ok(cell @ 1..=9) if available_moves.contains(&(cell - 1)) => return Ok(cell - 1),
            Ok(1..=9) => println!("The square is taken, please, choose another one."),
            _ => println!("Unknown symbol, please, try again (a number from 1 to 9):"),
        }
    }
}

fn ask_again<R: BufRead>(input: &mut R) -> io::Result<bool> {
    print!("Play again? (y/n) ");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

/// Human (0) against the trained player (X, moves first) until the human
/// stops.
pub fn play_game_human_computer_player(mut game: Game, name: &str) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let human = LEARNER_MARK.other();
    loop {
        game.start_live_play();
        loop {
            let mv = game
                .choose_action()
                .context("the computer has no move left")?;
            game.apply_move(mv, LEARNER_MARK)?;
            println!("The computer took cell {}", mv + 1);
            println!("{}", game.board);
            if game.check_win(LEARNER_MARK) {
                println!("Really sorry, {}, you have lost.", name);
                break;
            }
            if game.is_draw() {
                println!("The game ended in a draw.");
                break;
            }

            let mv = read_move(&mut input, &game.board, name)?;
            game.apply_move(mv, human)?;
            println!("{}", game.board);
            if game.check_win(human) {
                println!("Congratulations, {}! You have won!", name);
                break;
            }
            if game.is_draw() {
                println!("The game ended in a draw.");
                break;
            }
        }
        if !ask_again(&mut input)? {
            return Ok(());
        }
    }
}
