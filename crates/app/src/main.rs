use std::fmt;
use std::io::{self, BufRead, Write};

use course_core::model::{Answer, CourseId, Question, QuestionKind, Quiz, QuizId, StudentId};
use services::app_services::{ENV_API_URL, ENV_COURSE_ID, ENV_STUDENT_ID, parse_setting};
use services::{
    AppConfig, AppServices, Clock, LoadedCourse, QuizPhase, QuizSessionController,
    QuizSessionError, QuizSessionService,
};
use storage::InMemoryBackend;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingCourse,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingCourse => write!(f, "no course given (use --course or {ENV_COURSE_ID})"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- take [--api <url>] [--course <id>] [--student <id>] [--token <t>]");
    eprintln!("  cargo run -p app -- demo");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {ENV_API_URL}, COURSE_API_TOKEN, {ENV_STUDENT_ID}, {ENV_COURSE_ID}, COURSE_API_TIMEOUT_SECS");
    eprintln!("  RUST_LOG (default: info)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Demo,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "demo" => Some(Self::Demo),
            _ => None,
        }
    }
}

/// Apply `take` flags on top of the environment config.
fn parse_take(
    args: &mut impl Iterator<Item = String>,
    mut config: AppConfig,
) -> Result<AppConfig, Box<dyn std::error::Error>> {
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--api" => config.api_url = require_value(args, "--api")?,
            "--token" => config.api_token = Some(require_value(args, "--token")?),
            "--course" => {
                let value = require_value(args, "--course")?;
                config.course_id = Some(parse_setting("--course", &value)?);
            }
            "--student" => {
                let value = require_value(args, "--student")?;
                config.student_id = Some(parse_setting("--student", &value)?);
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => return Err(ArgsError::UnknownArg(arg).into()),
        }
    }
    Ok(config)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr so they do not interleave with quiz prompts.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn format_answer(answer: &Answer) -> String {
    match answer {
        Answer::Single(None) => "-1".into(),
        Answer::Single(Some(choice)) => choice.to_string(),
        Answer::Multiple(set) => {
            let items: Vec<String> = set.iter().map(ToString::to_string).collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

fn format_answers(answers: &[Answer]) -> String {
    let items: Vec<String> = answers.iter().map(format_answer).collect();
    format!("[{}]", items.join(", "))
}

fn phase_label(course: &LoadedCourse, quiz_id: &QuizId) -> String {
    match course.session.progress(quiz_id) {
        Some(p) if p.phase == QuizPhase::Submitted => {
            format!("submitted, {}%", p.percent.unwrap_or(0))
        }
        Some(p) => format!("{}/{} answered", p.answered, p.total),
        None => "not loaded".into(),
    }
}

fn print_question(index: usize, question: &Question, answer: Option<&Answer>) {
    let hint = match question.kind() {
        QuestionKind::Single => "pick one",
        QuestionKind::Multiple => "toggle any, comma separated",
    };
    println!();
    println!("{}. {} ({hint})", index + 1, question.text());
    let selected = answer.map(Answer::selected).unwrap_or_default();
    for (i, option) in question.options().iter().enumerate() {
        let mark = if selected.contains(&i) { "x" } else { " " };
        println!("   [{mark}] {}) {option}", i + 1);
    }
}

//
// ─── INTERACTIVE ───────────────────────────────────────────────────────────────
//

fn prompt(input: &mut impl BufRead, label: &str) -> io::Result<Option<String>> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Parse "2" or "1,3" into zero-based option indices.
fn parse_choices(raw: &str) -> Option<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().ok().and_then(|n| n.checked_sub(1)))
        .collect::<Option<Vec<_>>>()
        .filter(|v| !v.is_empty())
}

async fn run_quiz(
    svc: &QuizSessionService,
    course: &mut LoadedCourse,
    quiz: &Quiz,
    input: &mut impl BufRead,
) -> Result<(), Box<dyn std::error::Error>> {
    let quiz_id = quiz.id();

    if course.session.phase(quiz_id) == Some(QuizPhase::Submitted) {
        println!(
            "Already submitted: {}%",
            course.session.percent_score(quiz_id).unwrap_or(0)
        );
        match prompt(input, "Retake? [y/N] ")? {
            Some(answer) if answer.eq_ignore_ascii_case("y") => course.session.reset(quiz_id)?,
            _ => return Ok(()),
        }
    }

    for (index, question) in quiz.questions().iter().enumerate() {
        loop {
            let current = course.session.answers(quiz_id).and_then(|a| a.get(index));
            print_question(index, question, current);
            let Some(raw) = prompt(input, "> ")? else {
                return Ok(());
            };
            if raw.is_empty() && current.is_some_and(Answer::is_answered) {
                break;
            }
            let Some(choices) = parse_choices(&raw) else {
                println!("Enter option numbers, e.g. 2 or 1,3");
                continue;
            };
            let mut rejected = false;
            for choice in choices {
                if let Err(err) = course.session.select_answer(quiz_id, index, choice) {
                    println!("{err}");
                    rejected = true;
                    break;
                }
            }
            // Multiple-choice questions stay open so the student can toggle more.
            if !rejected && question.kind() == QuestionKind::Single {
                break;
            }
            if !rejected && question.kind() == QuestionKind::Multiple {
                println!("Press enter to continue, or toggle more options.");
            }
        }
    }

    loop {
        if !course.session.can_submit(quiz_id) {
            println!("Answer every question before submitting.");
            return Ok(());
        }
        match prompt(input, "Submit? [Y/n] ")? {
            Some(answer) if answer.eq_ignore_ascii_case("n") => return Ok(()),
            None => return Ok(()),
            Some(_) => {}
        }
        match svc.submit(&mut course.session, quiz_id).await {
            Ok(submission) => {
                println!(
                    "Score: {}/{} ({}%)",
                    submission.score(),
                    quiz.question_count(),
                    submission.percent_of(quiz.question_count())
                );
                return Ok(());
            }
            Err(QuizSessionError::GradingFailed(err)) => {
                println!("Could not submit: {err}");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn take(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let course_id = services.course_id().ok_or(ArgsError::MissingCourse)?;
    let svc = services.quiz_sessions();
    let mut course = svc.load_course(course_id).await?;
    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        println!();
        println!("Quizzes in {course_id} for {}:", course.session.student_id());
        for (i, quiz) in course.quizzes.iter().enumerate() {
            println!("  {}) {} [{}]", i + 1, quiz.title(), phase_label(&course, quiz.id()));
        }
        let Some(raw) = prompt(&mut input, "Pick a quiz (r = reload, q = quit): ")? else {
            return Ok(());
        };
        match raw.as_str() {
            "q" => return Ok(()),
            "r" => {
                if let Err(err) = svc.refresh(&mut course).await {
                    println!("{err}");
                }
                continue;
            }
            _ => {}
        }
        let picked = raw
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| course.quizzes.get(i))
            .cloned();
        match picked {
            Some(quiz) => run_quiz(&svc, &mut course, &quiz, &mut input).await?,
            None => println!("No such quiz."),
        }
    }
}

//
// ─── DEMO ──────────────────────────────────────────────────────────────────────
//

fn demo_quiz(course_id: &CourseId) -> Result<Quiz, course_core::Error> {
    let questions = vec![
        Question::new(
            0,
            "Pick a letter",
            vec!["A".into(), "B".into(), "C".into()],
            QuestionKind::Single,
        )?,
        Question::new(
            1,
            "Pick every letter",
            vec!["X".into(), "Y".into()],
            QuestionKind::Multiple,
        )?,
    ];
    Ok(Quiz::new(
        QuizId::new("demo-quiz")?,
        course_id.clone(),
        "Demo quiz",
        questions,
    )?)
}

fn demo_backend(course_id: &CourseId) -> Result<InMemoryBackend, Box<dyn std::error::Error>> {
    let backend = InMemoryBackend::new();
    backend.insert_quiz(demo_quiz(course_id)?, vec![vec![1], vec![0, 1]])?;
    Ok(backend)
}

async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    let course_id = CourseId::new("demo-course")?;
    let app = AppServices::in_memory(
        demo_backend(&course_id)?,
        StudentId::new("demo-student")?,
        Some(course_id.clone()),
        Clock::default_clock(),
    );
    let svc = app.quiz_sessions();
    let mut course = svc.load_course(&course_id).await?;
    let quiz = QuizId::new("demo-quiz")?;
    let session = &mut course.session;

    let show = |label: &str, session: &QuizSessionController| {
        println!(
            "{label:<22} answers={} can_submit={}",
            format_answers(session.answers(&quiz).unwrap_or_default()),
            session.can_submit(&quiz)
        );
    };

    show("initialize", &*session);
    session.select_answer(&quiz, 0, 1)?;
    show("select Q1 -> B", &*session);
    session.select_answer(&quiz, 1, 0)?;
    session.select_answer(&quiz, 1, 1)?;
    show("select Q2 -> X, Y", &*session);

    let submission = svc.submit(session, &quiz).await?;
    println!(
        "{:<22} score={} percent={}",
        "submit",
        submission.score(),
        session.percent_score(&quiz).unwrap_or(0)
    );

    if let Err(err) = session.select_answer(&quiz, 0, 0) {
        println!("{:<22} {err}", "select after submit");
    }

    session.reset(&quiz)?;
    show("reset", &*session);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.clone())
        })?,
    };

    match cmd {
        Command::Demo => demo().await,
        Command::Take => {
            let config = parse_take(&mut argv, AppConfig::from_env()?).inspect_err(|e| {
                eprintln!("{e}");
                print_usage();
            })?;
            let services = AppServices::http(&config, Clock::default_clock())?;
            tracing::info!(api = %config.api_url, "starting quiz session");
            take(&services).await
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
