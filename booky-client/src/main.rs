//! `booky` - command-line storefront for the Booky library.
//!
//! Session and cart survive between invocations in the state file named by
//! the configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use booky_client::{
    Agreements, CartItem, ClientConfig, ClientResult, LibraryStore, Notification,
    ProfileUpdate, RegisterRequest,
};
use booky_core::{BookId, BorrowDuration, EntityIdType, LoanFilter, LoanId, Page};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "booky", version, about = "Browse, borrow and review library books")]
struct Cli {
    /// Path to a `booky.toml` configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for the client crates.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session.
    Login {
        email: String,
        #[arg(long, env = "BOOKY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in.
    Register(RegisterArgs),
    /// Forget the session.
    Logout,
    /// Show the signed-in account.
    Whoami,
    /// Update your name or phone number.
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// List the catalogue.
    Books {
        #[arg(long)]
        q: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one book with its reviews.
    Book { id: i64 },
    Categories,
    /// Your loans.
    Loans,
    /// Borrow a single book.
    Borrow {
        book_id: i64,
        #[arg(long, default_value = "5", value_parser = parse_duration)]
        days: BorrowDuration,
    },
    /// Return a loan.
    Return { loan_id: i64 },
    /// Rate a book.
    Review {
        book_id: i64,
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Your reviews.
    Reviews {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    #[command(subcommand)]
    Cart(CartCommand),
    /// Borrow the books in the cart.
    Checkout(CheckoutArgs),
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long, env = "BOOKY_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand, Debug)]
enum CartCommand {
    Add {
        book_id: i64,
        #[arg(long, default_value_t = 1)]
        qty: u32,
    },
    Remove { book_id: i64 },
    List,
    Clear,
}

#[derive(Args, Debug)]
struct CheckoutArgs {
    #[arg(long, default_value = "5", value_parser = parse_duration)]
    days: BorrowDuration,
    /// Only check out these books (default: the whole cart).
    #[arg(long = "book")]
    books: Vec<i64>,
    /// Agree to return on time and to the borrowing policy.
    #[arg(long)]
    agree: bool,
    /// Show the due date without borrowing.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    Overview,
    Loans {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "all")]
        filter: LoanFilter,
    },
    Users {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Mark a loan returned on the borrower's behalf.
    MarkReturned { loan_id: i64 },
    CreateCategory { name: String },
    DeleteBook { id: i64 },
}

fn parse_duration(value: &str) -> Result<BorrowDuration, String> {
    let days: u32 = value.parse().map_err(|_| format!("not a number: {}", value))?;
    BorrowDuration::try_from(days).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ClientConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("booky: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = booky_client::telemetry::init_logging(config.log_format, cli.verbose) {
        eprintln!("booky: {}", e);
    }

    let store = match LibraryStore::from_config(&config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("booky: {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    let fallback = fallback_message(&cli.command);
    let result = run(&store, cli.command).await;

    // Saved even on failure: an expired token must not outlive this run.
    if let Err(e) = store.save_state(&config.state_path) {
        eprintln!("booky: could not save state: {}", e);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "Command failed");
            eprintln!("{}", Notification::from_error(&e, fallback));
            ExitCode::FAILURE
        }
    }
}

fn fallback_message(command: &Command) -> &'static str {
    match command {
        Command::Login { .. } => "Login failed",
        Command::Register(_) => "Registration failed",
        Command::Borrow { .. } => "Failed to borrow book",
        Command::Return { .. } => "Failed to return book",
        Command::Review { .. } => "Failed to submit review",
        Command::Checkout(_) => "Checkout failed",
        Command::Profile { .. } => "Failed to update profile",
        Command::Admin(_) => "Admin request failed",
        _ => "Request failed",
    }
}

async fn run(store: &LibraryStore, command: Command) -> ClientResult<()> {
    match command {
        Command::Login { email, password } => {
            let auth = store.login(&email, &password).await?;
            println!("{}", Notification::success(format!("Signed in as {}", auth.user.name)));
        }
        Command::Register(args) => {
            let request = RegisterRequest {
                name: args.name,
                email: args.email,
                phone: args.phone,
                password: args.password,
            };
            let auth = store.register(&request).await?;
            println!("{}", Notification::success(format!("Welcome, {}", auth.user.name)));
        }
        Command::Logout => {
            let message = if store.logout() { "Signed out" } else { "Not signed in" };
            println!("{}", Notification::info(message));
        }
        Command::Whoami => {
            let summary = store.profile().await?;
            let stats = summary.loan_stats;
            println!("{} <{}> ({})", summary.profile.name, summary.profile.email, summary.profile.role);
            println!(
                "loans: {} borrowed, {} late, {} returned; reviews: {}",
                stats.borrowed, stats.late, stats.returned, summary.reviews_count
            );
        }
        Command::Profile { name, phone } => {
            let update = ProfileUpdate { name, phone };
            if update.is_empty() {
                println!("{}", Notification::info("Nothing to update"));
                return Ok(());
            }
            let change = store.update_profile(&update).await?;
            println!("{}", Notification::success(change.message));
        }
        Command::Books { q, page } => {
            let books = store.books(q.as_deref(), page).await?;
            print_page(&books, |book| {
                format!(
                    "{:>5}  {}  by {}  [{:.1}*, {} in stock]",
                    book.id, book.title, book.author.name, book.rating, book.stock
                )
            });
        }
        Command::Book { id } => {
            let detail = store.book_detail(BookId::new(id)).await?;
            let book = &detail.book;
            println!("{} by {}", book.book.title, book.book.author.name);
            println!(
                "{} of {} copies available, borrowed {} times",
                book.book.stock, book.total_copies, book.borrow_count
            );
            if let Some(description) = &book.book.description {
                println!("\n{}\n", description);
            }
            for review in &detail.reviews {
                println!(
                    "  {}/5  {}: {}",
                    review.rating,
                    review.user.name,
                    review.comment.as_deref().unwrap_or("")
                );
            }
        }
        Command::Categories => {
            for category in store.categories().await? {
                println!("{:>5}  {}", category.id, category.name);
            }
        }
        Command::Loans => {
            let now = Utc::now();
            for loan in store.loans().await? {
                let late = if loan.is_late(now) { "  LATE" } else { "" };
                println!(
                    "{:>5}  {}  {}  due {}{}",
                    loan.id,
                    loan.status,
                    loan.book.title,
                    loan.due_at.format("%Y-%m-%d"),
                    late
                );
            }
        }
        Command::Borrow { book_id, days } => {
            store.borrow_book(BookId::new(book_id), days).await?;
            println!("{}", Notification::success(format!("Borrowed for {} days", days.days())));
        }
        Command::Return { loan_id } => {
            store.return_loan(LoanId::new(loan_id)).await?;
            println!("{}", Notification::success("Book returned"));
        }
        Command::Review {
            book_id,
            rating,
            comment,
        } => {
            store.submit_review(BookId::new(book_id), rating, comment).await?;
            println!("{}", Notification::success("Review submitted"));
        }
        Command::Reviews { page } => {
            let reviews = store.my_reviews(page).await?;
            print_page(&reviews, |r| {
                format!("{}/5  {}  {}", r.review.rating, r.book.title, r.review.comment.as_deref().unwrap_or(""))
            });
        }
        Command::Cart(command) => run_cart(store, command).await?,
        Command::Checkout(args) => run_checkout(store, args).await?,
        Command::Admin(command) => run_admin(store, command).await?,
    }
    Ok(())
}

async fn run_cart(store: &LibraryStore, command: CartCommand) -> ClientResult<()> {
    match command {
        CartCommand::Add { book_id, qty } => {
            let detail = store.book_detail(BookId::new(book_id)).await?;
            store.add_to_cart(CartItem::from_book(&detail.book.book, qty))?;
            println!("{}", Notification::success(format!("Added {} to cart", detail.book.book.title)));
        }
        CartCommand::Remove { book_id } => {
            let item = store.remove_from_cart(BookId::new(book_id))?;
            println!("{}", Notification::info(format!("Removed {}", item.title)));
        }
        CartCommand::List => {
            let cart = store.cart();
            if cart.is_empty() {
                println!("Cart is empty");
            }
            for item in cart.items() {
                println!("{:>5}  {} x{}", item.book_id, item.title, item.qty);
            }
        }
        CartCommand::Clear => {
            let removed = store.clear_cart();
            println!("{}", Notification::info(format!("Removed {} items", removed)));
        }
    }
    Ok(())
}

async fn run_checkout(store: &LibraryStore, args: CheckoutArgs) -> ClientResult<()> {
    let selection: Vec<BookId> = args.books.into_iter().map(BookId::new).collect();
    let selection = (!selection.is_empty()).then_some(selection.as_slice());

    if args.dry_run {
        let plan = store.checkout_plan(selection, args.days)?;
        for item in plan.items() {
            println!("{:>5}  {} x{}", item.book_id, item.title, item.qty);
        }
        println!("due {}", plan.due_date().format("%Y-%m-%d"));
        return Ok(());
    }

    let agreements = if args.agree {
        Agreements::accepted()
    } else {
        Agreements::default()
    };
    let receipt = store.checkout(selection, args.days, agreements).await?;
    println!(
        "{}",
        Notification::success(format!("Borrowed {} books", receipt.loan_ids.len()))
    );
    Ok(())
}

async fn run_admin(store: &LibraryStore, command: AdminCommand) -> ClientResult<()> {
    match command {
        AdminCommand::Overview => {
            let overview = store.admin_overview().await?;
            println!(
                "users {}  books {}  active loans {}  overdue {}",
                overview.totals.users, overview.totals.books, overview.loans.active, overview.loans.overdue
            );
            for top in &overview.top_borrowed {
                println!("{:>5}  {}  borrowed {} times", top.id, top.title, top.borrow_count);
            }
        }
        AdminCommand::Loans { page, filter } => {
            let loans = store.admin_loans(page, filter).await?;
            print_page(&loans, |l| {
                let who = l.user.as_ref().map_or("?", |u| u.name.as_str());
                format!("{:>5}  {}  {}  {}", l.loan.id, l.loan.status, l.loan.book.title, who)
            });
        }
        AdminCommand::Users { page } => {
            let users = store.admin_users(page).await?;
            print_page(&users, |u| format!("{:>5}  {} <{}> {}", u.id, u.name, u.email, u.role));
        }
        AdminCommand::MarkReturned { loan_id } => {
            store.admin_mark_returned(LoanId::new(loan_id)).await?;
            println!("{}", Notification::success("Loan marked returned"));
        }
        AdminCommand::CreateCategory { name } => {
            let category = store.create_category(&name).await?;
            println!("{}", Notification::success(format!("Created category {}", category.id)));
        }
        AdminCommand::DeleteBook { id } => {
            store.delete_book(BookId::new(id)).await?;
            println!("{}", Notification::success("Book deleted"));
        }
    }
    Ok(())
}

fn print_page<T>(page: &Page<T>, line: impl Fn(&T) -> String) {
    for item in &page.items {
        println!("{}", line(item));
    }
    println!("page {} of {} ({} total)", page.page, page.total_pages().max(1), page.total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_checkout_args() {
        let cli = Cli::parse_from(["booky", "checkout", "--days", "10", "--book", "3", "--book", "4", "--agree"]);
        let Command::Checkout(args) = cli.command else {
            panic!("expected checkout");
        };
        assert_eq!(args.days, BorrowDuration::TenDays);
        assert_eq!(args.books, vec![3, 4]);
        assert!(args.agree);
    }

    #[test]
    fn test_rejects_unsupported_duration() {
        assert!(Cli::try_parse_from(["booky", "borrow", "1", "--days", "7"]).is_err());
    }

    #[test]
    fn test_cart_errors_print_their_own_message() {
        let err: booky_client::ClientError = booky_client::CartError::Empty.into();
        assert_eq!(Notification::from_error(&err, "x").message, "Cart is empty");
    }
}
