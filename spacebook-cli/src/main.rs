mod logging;
mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use spacebook_client::{
    AccountService, ApiResponse, BackgroundPublisher, Draft, DraftStore, FailureKind, FileStore,
    FriendshipResolver, HttpClient, IntervalHost, LikeAction, Photo, Post, PostEngine,
    PostPermissions, RegistrationDraft, ScheduleEntry, SearchQuery, SearchScope, Session,
    SessionStore, SpacebookError, SpacebookResult, UnreachableKind, UserPatch, UserSummary,
    ViewScope, CONNECT_TIMEOUT,
};
use tokio::sync::watch;

use logging::{LogMode, init_logging};
use settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "spacebook", version, about = "CLI клиент для Spacebook")]
struct Cli {
    /// Адрес REST API, например `http://localhost:3333/api/1.0.0`.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Каталог локального хранилища (сессия, черновики, расписание).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Вход.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Регистрация с последующим входом.
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Выход. Локальная сессия удаляется в любом случае.
    Logout,
    /// Профиль текущего пользователя.
    Me,
    /// Изменение имени/фамилии.
    UpdateProfile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Фото профиля.
    #[command(subcommand)]
    Photo(PhotoCommand),
    /// Открыть профиль: лента видна только себе и друзьям.
    Profile { id: i64 },
    /// Посты.
    #[command(subcommand)]
    Post(PostCommand),
    /// Друзья и заявки.
    #[command(subcommand)]
    Friends(FriendsCommand),
    /// Поиск пользователей.
    Search {
        query: String,
        /// Искать только среди друзей.
        #[arg(long)]
        friends: bool,
        #[arg(long, default_value_t = SearchQuery::DEFAULT_LIMIT)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Черновики.
    #[command(subcommand)]
    Draft(DraftCommand),
    /// Расписание публикаций.
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    /// Один фоновый запуск: опубликовать всё, что пора.
    Publish,
    /// Публиковать расписание по таймеру до Ctrl-C.
    Daemon,
}

#[derive(Debug, Subcommand)]
enum PhotoCommand {
    /// Скачать фото. Без `--out` печатает `data:` URL.
    Get {
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Загрузить фото (png или jpeg).
    Upload {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum PostCommand {
    /// Опубликовать пост. По умолчанию на своей странице.
    Create {
        #[arg(long)]
        text: String,
        #[arg(long)]
        profile: Option<i64>,
    },
    /// Показать пост.
    Get {
        #[arg(long)]
        profile: i64,
        #[arg(long)]
        id: i64,
    },
    /// Изменить текст своего поста.
    Edit {
        #[arg(long)]
        profile: i64,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        text: String,
    },
    /// Удалить свой пост.
    Delete {
        #[arg(long)]
        profile: i64,
        #[arg(long)]
        id: i64,
    },
    /// Поставить или снять лайк.
    Like {
        #[arg(long)]
        profile: i64,
        #[arg(long)]
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum FriendsCommand {
    /// Список друзей. По умолчанию свой.
    List {
        #[arg(long)]
        user_id: Option<i64>,
    },
    /// Отправить заявку в друзья.
    Add { id: i64 },
    /// Входящие заявки.
    Requests,
    /// Принять заявку.
    Accept { id: i64 },
    /// Отклонить заявку.
    Decline { id: i64 },
}

#[derive(Debug, Subcommand)]
enum DraftCommand {
    /// Сохранить черновик.
    Save {
        #[arg(long)]
        text: String,
    },
    /// Список черновиков.
    List,
    /// Удалить черновик.
    Delete { id: i64 },
    /// Забрать черновик в редактор (он удаляется из списка).
    ///
    /// С `--publish` текст сразу публикуется на своей странице.
    Edit {
        id: i64,
        #[arg(long)]
        publish: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ScheduleCommand {
    /// Запланировать черновик или новый текст.
    Add {
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        draft: Option<i64>,
        #[arg(long)]
        text: Option<String>,
        /// Время публикации в RFC 3339.
        #[arg(long, conflicts_with = "delay", required_unless_present = "delay")]
        at: Option<String>,
        /// Через сколько опубликовать, например `10m` или `2h 30m`.
        #[arg(long = "in", id = "delay")]
        delay: Option<String>,
    },
    /// Список запланированных публикаций.
    List,
    /// Снять публикацию с расписания.
    Cancel { id: i64 },
}

struct App {
    settings: Settings,
    api: Arc<HttpClient>,
    store: Arc<FileStore>,
}

impl App {
    fn new(settings: Settings) -> Result<Self> {
        let api = HttpClient::with_timeouts(
            settings.api_url.clone(),
            CONNECT_TIMEOUT,
            settings.request_timeout,
        )
        .map_err(map_client_error)?;
        let store = FileStore::open(&settings.data_dir).with_context(|| {
            format!(
                "не удалось открыть каталог данных {}",
                settings.data_dir.display()
            )
        })?;

        Ok(Self {
            settings,
            api: Arc::new(api),
            store: Arc::new(store),
        })
    }

    fn accounts(&self) -> AccountService<HttpClient, FileStore> {
        AccountService::new(Arc::clone(&self.api), self.sessions())
    }

    fn sessions(&self) -> SessionStore<FileStore> {
        SessionStore::new(Arc::clone(&self.store))
    }

    fn drafts(&self) -> DraftStore<FileStore> {
        DraftStore::new(Arc::clone(&self.store))
    }

    fn posts(&self) -> PostEngine<HttpClient> {
        PostEngine::new(Arc::clone(&self.api))
    }

    fn friendship(&self) -> FriendshipResolver<HttpClient> {
        FriendshipResolver::new(Arc::clone(&self.api))
    }

    fn publisher(&self) -> BackgroundPublisher<HttpClient, FileStore> {
        BackgroundPublisher::new(Arc::clone(&self.api), Arc::clone(&self.store))
    }

    async fn session(&self) -> Result<Session> {
        self.sessions()
            .offload(|s| s.load())
            .await
            .context("не удалось прочитать сессию")?
            .ok_or_else(|| anyhow!("требуется авторизация: выполните `spacebook login ...`"))
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Ошибка: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::from_env()?.with_overrides(cli.server, cli.data_dir);
    let mode = match cli.command {
        Command::Daemon => LogMode::Daemon,
        _ => LogMode::Command,
    };
    init_logging(&settings.log_level, mode)?;
    tracing::debug!(api_url = %settings.api_url, data_dir = %settings.data_dir.display(), "starting");

    let app = App::new(settings)?;
    match cli.command {
        Command::Login { email, password } => {
            let session = ensure_ok(app.accounts().authenticate(&email, &password).await)?;
            print_session("Вход выполнен", session.body.as_ref());
        }
        Command::Signup {
            email,
            password,
            first_name,
            last_name,
        } => {
            let registration = RegistrationDraft::new()
                .credentials(email, password)
                .details(first_name, last_name);
            let session = ensure_ok(app.accounts().register(&registration).await)?;
            print_session("Регистрация успешна", session.body.as_ref());
        }
        Command::Logout => {
            let session = app.session().await?;
            let response = app
                .accounts()
                .unauthenticate(&session)
                .await
                .map_err(map_client_error)?;
            if response.ok {
                println!("Выход выполнен");
            } else {
                println!(
                    "Локальная сессия удалена, сервер ответил: {}",
                    response.message
                );
            }
        }
        Command::Me => {
            let session = app.session().await?;
            let user = ensure_ok(app.accounts().user(&session, session.user_id).await)?;
            if let Some(user) = user.body {
                println!("id: {}", user.user_id);
                println!("name: {} {}", user.first_name, user.last_name);
                println!("email: {}", user.email);
                println!("friends: {}", user.friend_count);
            }
        }
        Command::UpdateProfile {
            first_name,
            last_name,
        } => {
            if first_name.is_none() && last_name.is_none() {
                return Err(anyhow!("укажите --first-name и/или --last-name"));
            }
            let session = app.session().await?;
            let patch = UserPatch {
                first_name,
                last_name,
            };
            ensure_ok(app.accounts().update_profile(&session, &patch).await)?;
            println!("Профиль обновлён");
        }
        Command::Photo(command) => run_photo(&app, command).await?,
        Command::Profile { id } => run_profile(&app, id).await?,
        Command::Post(command) => run_post(&app, command).await?,
        Command::Friends(command) => run_friends(&app, command).await?,
        Command::Search {
            query,
            friends,
            limit,
            offset,
        } => {
            let session = app.session().await?;
            let query = SearchQuery {
                scope: if friends {
                    SearchScope::Friends
                } else {
                    SearchScope::All
                },
                limit,
                offset,
                ..SearchQuery::new(query)
            };
            let users = ensure_ok(app.accounts().search(&session, &query).await)?;
            print_users("Найдено", users.body.as_deref().unwrap_or_default());
        }
        Command::Draft(command) => run_draft(&app, command).await?,
        Command::Schedule(command) => run_schedule(&app, command).await?,
        Command::Publish => {
            let result = app
                .publisher()
                .run_once(chrono::Utc::now().timestamp_millis())
                .await;
            println!("Фоновый запуск: {result:?}");
        }
        Command::Daemon => {
            let host = IntervalHost::new(
                app.settings.poll_interval,
                app.settings.max_poll_interval,
            );
            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = tx.send(true);
                }
            });

            println!("Публикация расписания запущена, Ctrl-C для остановки");
            let invocations = host.run(&app.publisher(), rx).await;
            println!("Остановлено после {invocations} запусков");
        }
    }

    Ok(())
}

async fn run_photo(app: &App, command: PhotoCommand) -> Result<()> {
    let session = app.session().await?;
    match command {
        PhotoCommand::Get { user_id, out } => {
            let user_id = user_id.unwrap_or(session.user_id);
            let photo = ensure_ok(app.accounts().profile_photo(&session, user_id).await)?;
            let Some(photo) = photo.body else {
                return Ok(());
            };
            match out {
                Some(path) => {
                    fs::write(&path, &photo.bytes)
                        .with_context(|| format!("не удалось записать {}", path.display()))?;
                    println!("Фото сохранено: {} ({})", path.display(), photo.content_type);
                }
                None => println!("{}", photo.to_data_url()),
            }
        }
        PhotoCommand::Upload { file } => {
            let content_type = content_type_for(&file)?;
            let bytes =
                fs::read(&file).with_context(|| format!("не удалось прочитать {}", file.display()))?;
            let photo = Photo {
                content_type: content_type.to_string(),
                bytes,
            };
            ensure_ok(app.accounts().upload_profile_photo(&session, &photo).await)?;
            println!("Фото загружено");
        }
    }
    Ok(())
}

async fn run_profile(app: &App, id: i64) -> Result<()> {
    let session = app.session().await?;
    let resolver = app.friendship();

    let scope = ViewScope::new();
    let guard = scope.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.unmount();
        }
    });

    let Some(loaded) = scope.run(resolver.load_profile(&session, id)).await else {
        println!("Просмотр профиля отменён");
        return Ok(());
    };
    let view = ensure_ok(loaded)?;
    let Some(view) = view.body else {
        return Ok(());
    };

    println!("Профиль id={id}");
    if view.friendship.is_self {
        println!("Это ваш профиль");
    } else if view.friendship.is_friend {
        println!("Вы друзья");
    }

    match view.posts {
        Some(posts) => {
            let posts = ensure_ok(Ok(posts))?;
            print_feed(&session, id, posts.body.as_deref().unwrap_or_default());
        }
        None => {
            println!("Лента доступна только друзьям.");
            println!("Отправить заявку: spacebook friends add {id}");
        }
    }
    Ok(())
}

async fn run_post(app: &App, command: PostCommand) -> Result<()> {
    let session = app.session().await?;
    let posts = app.posts();

    match command {
        PostCommand::Create { text, profile } => {
            let profile = profile.unwrap_or(session.user_id);
            let mutation = posts
                .create_post(&session, profile, &text)
                .await
                .map_err(map_client_error)?;
            let created = ensure_ok(Ok(mutation.response))?;
            if let Some(created) = created.body {
                println!("Пост создан: id={}", created.post_id);
            }
        }
        PostCommand::Get { profile, id } => {
            let post = ensure_ok(posts.get_post(&session, profile, id).await)?;
            if let Some(post) = post.body {
                print_post(&post, posts.permissions(&session, profile, &post));
            }
        }
        PostCommand::Edit { profile, id, text } => {
            let post = fetch_post(&posts, &session, profile, id).await?;
            let mutation = posts
                .update_post(&session, profile, &post, &text)
                .await
                .map_err(map_client_error)?;
            ensure_ok(Ok(mutation.response))?;
            println!("Пост обновлён: id={id}");
        }
        PostCommand::Delete { profile, id } => {
            let post = fetch_post(&posts, &session, profile, id).await?;
            let mutation = posts
                .delete_post(&session, profile, &post)
                .await
                .map_err(map_client_error)?;
            ensure_ok(Ok(mutation.response))?;
            println!("Пост удалён: id={id}");
        }
        PostCommand::Like { profile, id } => {
            let mutation = posts
                .toggle_like(&session, profile, id)
                .await
                .map_err(map_client_error)?;
            let likes = mutation
                .feed
                .as_ref()
                .and_then(|feed| feed.body.as_ref())
                .and_then(|feed| feed.iter().find(|post| post.post_id == id))
                .map(|post| post.num_likes);
            let action = ensure_ok(Ok(mutation.response))?;
            match action.body {
                Some(LikeAction::Liked) => print!("Лайк поставлен"),
                Some(LikeAction::Unliked) => print!("Лайк снят"),
                None => print!("{}", action.message),
            }
            match likes {
                Some(likes) => println!(" (лайков: {likes})"),
                None => println!(),
            }
        }
    }
    Ok(())
}

async fn fetch_post(
    posts: &PostEngine<HttpClient>,
    session: &Session,
    profile: i64,
    id: i64,
) -> Result<Post> {
    ensure_ok(posts.get_post(session, profile, id).await)?
        .body
        .ok_or_else(|| anyhow!("сервер не вернул пост id={id}"))
}

async fn run_friends(app: &App, command: FriendsCommand) -> Result<()> {
    let session = app.session().await?;
    let resolver = app.friendship();

    match command {
        FriendsCommand::List { user_id } => {
            let user_id = user_id.unwrap_or(session.user_id);
            let friends = ensure_ok(resolver.friends(&session, user_id).await)?;
            print_users("Друзья", friends.body.as_deref().unwrap_or_default());
        }
        FriendsCommand::Add { id } => {
            ensure_ok(resolver.add_friend(&session, id).await)?;
            println!("Заявка отправлена: id={id}");
        }
        FriendsCommand::Requests => {
            let requests = ensure_ok(resolver.friend_requests(&session).await)?;
            print_users("Заявки", requests.body.as_deref().unwrap_or_default());
        }
        FriendsCommand::Accept { id } => {
            let decision = resolver
                .accept_request(&session, id)
                .await
                .map_err(map_client_error)?;
            print_decision(&decision.snapshot.friends, &decision.snapshot.requests);
            ensure_ok(Ok(decision.response))?;
            println!("Заявка принята: id={id}");
        }
        FriendsCommand::Decline { id } => {
            let decision = resolver
                .decline_request(&session, id)
                .await
                .map_err(map_client_error)?;
            print_decision(&decision.snapshot.friends, &decision.snapshot.requests);
            ensure_ok(Ok(decision.response))?;
            println!("Заявка отклонена: id={id}");
        }
    }
    Ok(())
}

async fn run_draft(app: &App, command: DraftCommand) -> Result<()> {
    let drafts = app.drafts();

    match command {
        DraftCommand::Save { text } => {
            let draft = drafts
                .offload(move |d| d.save_draft(&text))
                .await
                .context("не удалось сохранить черновик")?;
            println!("Черновик сохранён: id={}", draft.id);
        }
        DraftCommand::List => {
            let list = drafts
                .offload(|d| d.drafts())
                .await
                .context("не удалось прочитать черновики")?;
            println!("Черновиков: {}", list.len());
            for draft in &list {
                print_draft(draft);
            }
        }
        DraftCommand::Delete { id } => {
            let deleted = drafts
                .offload(move |d| d.delete_draft(id))
                .await
                .context("не удалось удалить черновик")?;
            if deleted {
                println!("Черновик удалён: id={id}");
            } else {
                println!("Черновик не найден: id={id}");
            }
        }
        DraftCommand::Edit { id, publish: false } => {
            let draft = take_draft(&drafts, id).await?;
            println!("{}", draft.text);
        }
        DraftCommand::Edit { id, publish: true } => {
            // без сессии черновик не трогаем
            let session = app.session().await?;
            let draft = take_draft(&drafts, id).await?;

            let published = app
                .posts()
                .publish(&session, session.user_id, &draft.text)
                .await;
            match published {
                Ok(response) if response.ok => {
                    println!("Черновик опубликован");
                }
                Ok(response) => {
                    return_draft(&drafts, draft).await?;
                    return Err(anyhow!(describe_failure(&response)));
                }
                Err(
                    err @ SpacebookError::Unreachable {
                        kind: UnreachableKind::Connect,
                        ..
                    },
                ) => {
                    return_draft(&drafts, draft).await?;
                    return Err(map_client_error(err));
                }
                Err(err) => {
                    // пост мог уже появиться на сервере, повторной публикации не допускаем
                    return Err(map_client_error(err).context(format!(
                        "черновик id={id} не восстановлен, проверьте ленту; текст: {}",
                        draft.text
                    )));
                }
            }
        }
    }
    Ok(())
}

async fn take_draft(drafts: &DraftStore<FileStore>, id: i64) -> Result<Draft> {
    drafts
        .offload(move |d| d.take_draft(id))
        .await
        .context("не удалось прочитать черновик")?
        .ok_or_else(|| anyhow!("черновик не найден: id={id}"))
}

async fn return_draft(drafts: &DraftStore<FileStore>, draft: Draft) -> Result<()> {
    let restored = drafts
        .offload(move |d| d.save_draft(&draft.text))
        .await
        .context("не удалось вернуть черновик")?;
    println!("Черновик возвращён: id={}", restored.id);
    Ok(())
}

async fn run_schedule(app: &App, command: ScheduleCommand) -> Result<()> {
    let drafts = app.drafts();

    match command {
        ScheduleCommand::Add {
            draft,
            text,
            at,
            delay,
        } => {
            let now = chrono::Utc::now().timestamp_millis();
            let timestamp = resolve_publish_time(at.as_deref(), delay.as_deref(), now)?;
            let entry = match (draft, text) {
                (Some(id), _) => drafts
                    .offload(move |d| d.schedule_draft(id, timestamp))
                    .await
                    .context("не удалось запланировать черновик")?
                    .ok_or_else(|| anyhow!("черновик не найден: id={id}"))?,
                (None, Some(text)) => drafts
                    .offload(move |d| d.schedule_text(&text, timestamp))
                    .await
                    .context("не удалось запланировать публикацию")?,
                (None, None) => return Err(anyhow!("укажите --draft или --text")),
            };
            print!("Запланировано: ");
            print_entry(&entry);
        }
        ScheduleCommand::List => {
            let entries = drafts
                .offload(|d| d.schedule())
                .await
                .context("не удалось прочитать расписание")?;
            println!("Запланировано: {}", entries.len());
            for entry in &entries {
                print_entry(entry);
            }
        }
        ScheduleCommand::Cancel { id } => {
            let cancelled = drafts
                .offload(move |d| d.cancel_scheduled(id))
                .await
                .context("не удалось изменить расписание")?;
            match cancelled {
                Some(entry) if entry.is_publishing() => println!(
                    "Публикация отменена: id={id}; запрос уже отправлен, пост может появиться"
                ),
                Some(_) => println!("Публикация отменена: id={id}"),
                None => println!("В расписании нет записи id={id}"),
            }
        }
    }
    Ok(())
}

/// Время публикации из `--at` (RFC 3339) или `--in` (длительность).
fn resolve_publish_time(at: Option<&str>, delay: Option<&str>, now_ms: i64) -> Result<i64> {
    match (at, delay) {
        (Some(at), None) => chrono::DateTime::parse_from_rfc3339(at.trim())
            .map(|dt| dt.timestamp_millis())
            .with_context(|| format!("некорректное время `{at}`, ожидается RFC 3339")),
        (None, Some(delay)) => {
            let delay = humantime::parse_duration(delay.trim())
                .with_context(|| format!("некорректная длительность `{delay}`"))?;
            let delay = i64::try_from(delay.as_millis()).context("слишком большая длительность")?;
            Ok(now_ms.saturating_add(delay))
        }
        _ => Err(anyhow!("укажите ровно одно из --at и --in")),
    }
}

fn content_type_for(path: &Path) -> Result<&'static str> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        _ => Err(anyhow!("поддерживаются только png и jpeg: {}", path.display())),
    }
}

/// Ошибка транспорта или отказ сервера превращаются в ошибку команды.
fn ensure_ok<T>(result: SpacebookResult<ApiResponse<T>>) -> Result<ApiResponse<T>> {
    let response = result.map_err(map_client_error)?;
    if response.ok {
        return Ok(response);
    }
    Err(anyhow!(describe_failure(&response)))
}

fn describe_failure<T>(response: &ApiResponse<T>) -> String {
    match response.failure {
        Some(FailureKind::Unauthorized) => format!(
            "требуется авторизация: выполните `spacebook login ...` ({})",
            response.message
        ),
        Some(FailureKind::NotFound) => format!("не найдено: {}", response.message),
        Some(FailureKind::Forbidden) => format!("запрещено: {}", response.message),
        _ => format!("сервер отклонил запрос: {}", response.message),
    }
}

fn map_client_error(err: SpacebookError) -> anyhow::Error {
    let message = match err {
        SpacebookError::Unreachable { .. } if err.is_timeout() => {
            format!("сервер не ответил вовремя, результат неизвестен: {err}")
        }
        SpacebookError::Unreachable { message, .. } => format!("сервер недоступен: {message}"),
        SpacebookError::Decode { endpoint, message } => {
            format!("не удалось разобрать ответ {endpoint}: {message}")
        }
        SpacebookError::InvalidRequest(message) => format!("некорректный запрос: {message}"),
        SpacebookError::Storage(err) => format!("ошибка локального хранилища: {err}"),
    };
    anyhow!(message)
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

fn print_session(title: &str, session: Option<&Session>) {
    println!("{title}");
    if let Some(session) = session {
        println!("user_id: {}", session.user_id);
    }
}

fn print_users(title: &str, users: &[UserSummary]) {
    println!("{title}: {}", users.len());
    for user in users {
        println!(
            "- [{}] {} {} <{}>",
            user.user_id, user.first_name, user.last_name, user.email
        );
    }
}

fn print_decision(
    friends: &ApiResponse<Vec<UserSummary>>,
    requests: &ApiResponse<Vec<UserSummary>>,
) {
    match friends.body.as_deref() {
        Some(friends) => print_users("Друзья", friends),
        None => println!("Друзья: {}", friends.message),
    }
    match requests.body.as_deref() {
        Some(requests) => print_users("Заявки", requests),
        None => println!("Заявки: {}", requests.message),
    }
}

fn permission_marks(permissions: PostPermissions) -> String {
    let mut marks = Vec::new();
    if permissions.can_like {
        marks.push("like");
    }
    if permissions.can_edit {
        marks.push("edit");
    }
    if permissions.can_delete {
        marks.push("delete");
    }
    marks.join(",")
}

fn print_post(post: &Post, permissions: PostPermissions) {
    println!("id: {}", post.post_id);
    println!(
        "author: {} {} (id={})",
        post.author.first_name, post.author.last_name, post.author.user_id
    );
    println!("published: {}", format_timestamp(post.timestamp));
    println!("likes: {}", post.num_likes);
    println!("actions: {}", permission_marks(permissions));
    println!("text: {}", post.text);
}

fn print_feed(session: &Session, profile_id: i64, posts: &[Post]) {
    println!("Постов: {}", posts.len());
    for post in posts {
        let permissions = PostPermissions::resolve(session.user_id, profile_id, post);
        println!(
            "- [{}] {} {}: {} (likes={}, actions={})",
            post.post_id,
            post.author.first_name,
            post.author.last_name,
            post.text,
            post.num_likes,
            permission_marks(permissions)
        );
    }
}

fn print_draft(draft: &Draft) {
    println!("- [{}] {}", draft.id, draft.text);
}

fn print_entry(entry: &ScheduleEntry) {
    let state = if entry.is_publishing() {
        " (публикуется)"
    } else {
        ""
    };
    println!(
        "[{}] {} -> {}{state}",
        entry.draft.id,
        format_timestamp(entry.timestamp),
        entry.draft.text
    );
}
