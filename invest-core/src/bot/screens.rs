//! Text and menus for every screen the bot renders.

use crate::export::ExportFormat;
use crate::menu::{Action, Menu, Screen};
use crate::prompts::truncate_for_display;
use crate::retrieval::SimilarMatch;
use crate::session::{Analysis, AnalysisSource, ImprovementChain};
use crate::store::Example;
use crate::validate::ValidationError;

use super::{BotError, StatsSnapshot};

const SAMPLE_STORY: &str = "Как клиент банка, я хочу видеть баланс, чтобы планировать расходы";

fn nav(menu: Menu) -> Menu {
    menu.item("⬅️ Назад", Action::Back)
        .item("🔄 Начать заново", Action::Restart)
}

fn percent(similarity: f64) -> u32 {
    (similarity * 100.0).round() as u32
}

fn score_line(score: Option<u8>) -> String {
    match score {
        Some(s) => format!("{s}/6"),
        None => "—".to_string(),
    }
}

pub(crate) fn main_menu() -> Screen {
    let menu = Menu::new()
        .item("📝 Проанализировать историю", Action::Begin)
        .item("📚 База историй", Action::ShowDatabase(0))
        .item("📊 Статистика", Action::Stats)
        .item("❓ Помощь", Action::Help);
    Screen::new(
        "main_menu",
        "Привет! Я помогаю доводить user story до ума по критериям INVEST.\n\
         Отправьте историю текстом или выберите действие.",
        menu,
    )
}

pub(crate) fn awaiting_story() -> Screen {
    Screen::new(
        "awaiting_story",
        format!("Отправьте user story в формате:\n«Как <роль>, я хочу <действие>, чтобы <цель>»\n\nПример: {SAMPLE_STORY}"),
        nav(Menu::new()),
    )
}

pub(crate) fn invalid_story(err: &ValidationError) -> Screen {
    let hint = match err {
        ValidationError::Empty => "Сообщение пустое.".to_string(),
        ValidationError::TooShort { min, .. } => {
            format!("История слишком короткая (нужно хотя бы {min} символов).")
        }
        ValidationError::TooLong { len, max } => {
            format!("История слишком длинная: {len} символов при максимуме {max}. Сократите ее.")
        }
        ValidationError::NotAStory => {
            "Не похоже на user story: не хватает роли, действия или цели.".to_string()
        }
    };
    let menu = Menu::new().item_if(
        err.is_fixable(),
        "🤖 Исправить с помощью ИИ",
        Action::FixWithJudge,
    );
    Screen::new(
        "invalid_story",
        format!("{hint}\n\nФормат: «Как <роль>, я хочу <действие>, чтобы <цель>»\nПример: {SAMPLE_STORY}"),
        nav(menu),
    )
}

pub(crate) fn similar(story: &str, matches: &[SimilarMatch]) -> Screen {
    let mut text = format!("Нашлись похожие истории для:\n«{story}»\n");
    let mut menu = Menu::new();
    for (i, m) in matches.iter().enumerate() {
        let golden = if m.is_golden { " ⭐" } else { "" };
        text.push_str(&format!(
            "\n{}. ({}%, оценка {}){golden}\n{}\n",
            i + 1,
            percent(m.similarity),
            score_line((m.score > 0).then_some(m.score)),
            m.original_text,
        ));
        menu = menu.item(format!("Вариант {}", i + 1), Action::PickSimilar(i));
    }
    text.push_str("\nВыберите вариант или отправьте свою историю на анализ.");
    let menu = menu.item("🆕 Анализировать мой вариант", Action::UseOwn);
    Screen::new("similar", text, nav(menu))
}

pub(crate) fn result(analysis: &Analysis, has_chain: bool, display_limit: usize) -> Screen {
    let origin = match analysis.source {
        AnalysisSource::Judge => "Анализ выполнен ИИ".to_string(),
        AnalysisSource::Cache => "Результат из кэша".to_string(),
        AnalysisSource::Corpus => match analysis.similarity {
            Some(s) => format!("Найдено в базе (сходство {}%)", percent(s)),
            None => "Найдено в базе".to_string(),
        },
    };
    let title = if analysis.improved {
        "Анализ улучшенной истории"
    } else {
        "Анализ истории"
    };
    let mut text = format!(
        "{title}\n«{}»\n\n{}\n\n{origin}",
        analysis.story,
        truncate_for_display(&analysis.judgment, display_limit),
    );
    if analysis.search_unavailable {
        text.push_str("\n⚠️ База историй недоступна, похожих результатов не найдено.");
    }
    let menu = Menu::new()
        .item("✨ Улучшить", Action::Improve)
        .item_if(has_chain, "📜 История улучшений", Action::ShowHistory)
        .item("📤 Экспорт", Action::OpenExport)
        .item_if(
            analysis.source != AnalysisSource::Corpus,
            "💾 Сохранить в базу",
            Action::SaveToCorpus,
        );
    Screen::new("result", text, nav(menu))
}

pub(crate) fn fixed(text: &str, well_formed: bool) -> Screen {
    let note = if well_formed {
        ""
    } else {
        "\n\n⚠️ Ответ все еще не в формате user story."
    };
    let menu = Menu::new()
        .item("🔍 Проанализировать", Action::UseOwn)
        .item("🤖 Исправить еще раз", Action::FixWithJudge);
    Screen::new(
        "fixed",
        format!("Исправленная история:\n\n{text}{note}"),
        nav(menu),
    )
}

pub(crate) fn improved(version: u32, text: &str, well_formed: bool) -> Screen {
    let note = if well_formed {
        ""
    } else {
        "\n\n⚠️ Ответ все еще не в формате user story."
    };
    let menu = Menu::new()
        .item("🔍 Проанализировать улучшенную", Action::AnalyzeImproved)
        .item("✨ Улучшить еще", Action::ImproveAgain)
        .item("📜 История улучшений", Action::ShowHistory);
    Screen::new(
        "improved",
        format!("Версия {version}:\n\n{text}{note}"),
        nav(menu),
    )
}

pub(crate) fn history(chain: &ImprovementChain) -> Screen {
    let mut text = String::from("История улучшений:\n");
    for entry in chain.entries() {
        let score = match (&entry.judgment, entry.score) {
            (Some(_), score) => format!(" (оценка {})", score_line(score)),
            (None, _) => String::new(),
        };
        text.push_str(&format!("\nВерсия {}{score}:\n{}\n", entry.version, entry.text));
    }
    let menu = Menu::new()
        .item("✨ Улучшить еще", Action::ImproveAgain)
        .item("🔍 Проанализировать последнюю", Action::AnalyzeImproved);
    Screen::new("history", text, nav(menu))
}

pub(crate) fn export_menu() -> Screen {
    let menu = Menu::new()
        .item("📄 TXT", Action::ExportAs(ExportFormat::Text))
        .item("📊 CSV", Action::ExportAs(ExportFormat::Csv));
    Screen::new("export_menu", "Выберите формат экспорта:", nav(menu))
}

pub(crate) fn exported(analysis: &Analysis, format: ExportFormat, has_chain: bool) -> Screen {
    let mut screen = result(analysis, has_chain, 200);
    screen.label = "exported".to_string();
    screen.text = format!(
        "Файл story_analysis.{} готов.\n\n{}",
        format.extension(),
        screen.text
    );
    screen
}

pub(crate) fn saved(analysis: &Analysis, has_chain: bool, display_limit: usize) -> Screen {
    let mut screen = result(analysis, has_chain, display_limit);
    screen.label = "saved".to_string();
    screen.text = format!("💾 История сохранена в базу.\n\n{}", screen.text);
    screen
}

pub(crate) fn database(rows: &[Example], page: usize, pages: usize, total: u64) -> Screen {
    if rows.is_empty() {
        return Screen::new("database", "База историй пока пуста.", nav(Menu::new()));
    }

    let mut text = format!("База историй: {total} шт. Страница {} из {pages}\n", page + 1);
    let mut menu = Menu::new();
    for row in rows {
        let golden = if row.is_golden { "⭐ " } else { "" };
        text.push_str(&format!(
            "\n#{} {golden}(оценка {}, использований {})\n{}\n",
            row.id,
            score_line((row.score > 0).then_some(row.score)),
            row.usage_count,
            truncate_for_display(&row.original_text, 120),
        ));
        menu = menu.item(format!("#{}", row.id), Action::ShowStory(row.id));
    }
    let menu = menu
        .item_if(page > 0, "◀️", Action::ShowDatabase(page.saturating_sub(1)))
        .item_if(page + 1 < pages, "▶️", Action::ShowDatabase(page + 1));
    Screen::new("database", text, nav(menu))
}

pub(crate) fn story_detail(example: &Example, page: usize, display_limit: usize) -> Screen {
    let golden = if example.is_golden { " ⭐" } else { "" };
    let text = format!(
        "История #{}{golden}\n«{}»\n\n{}\n\nОценка: {}, использований: {}, добавлена {}",
        example.id,
        example.original_text,
        truncate_for_display(&example.judgment, display_limit),
        score_line((example.score > 0).then_some(example.score)),
        example.usage_count,
        example.created_at.format("%Y-%m-%d"),
    );
    let menu = Menu::new().item("📚 К списку", Action::ShowDatabase(page));
    Screen::new("story_detail", text, nav(menu))
}

pub(crate) fn help() -> Screen {
    Screen::new(
        "help",
        format!(
            "Как пользоваться:\n\
             1. Отправьте user story. Сначала я ищу похожие уже оцененные истории.\n\
             2. Если похожих нет, историю оценит ИИ по критериям INVEST (оценка X/6).\n\
             3. Историю можно улучшить, посмотреть версии и выгрузить в TXT или CSV.\n\
             4. Хорошие истории попадают в базу и помогают следующим пользователям.\n\n\
             Пример: {SAMPLE_STORY}"
        ),
        nav(Menu::new()),
    )
}

pub(crate) fn stats(stats: &StatsSnapshot) -> Screen {
    let corpus = match &stats.corpus {
        Some(c) => format!(
            "Историй в базе: {} (эталонных {}), средняя оценка эталонов {:.2}, использований {}",
            c.total, c.golden, c.average_score, c.total_usage
        ),
        None => "База недоступна".to_string(),
    };
    let text = format!(
        "Статистика\n\n{corpus}\n\
         Активных сессий: {}\n\
         Сообщений обработано: {}, ошибок: {}\n\
         Обращений к ИИ: {}\n\
         Кэш поиска: {:.0}% попаданий, кэш оценок: {:.0}% попаданий\n\
         Аптайм: {} мин",
        stats.sessions.active_sessions,
        stats.messages,
        stats.errors,
        stats.judge_calls,
        stats.search_cache.hit_rate() * 100.0,
        stats.judgment_cache.hit_rate() * 100.0,
        stats.uptime_secs / 60,
    );
    Screen::new("stats", text, nav(Menu::new()))
}

pub(crate) fn error(err: &BotError, retry: Option<Action>) -> Screen {
    let text = match err {
        BotError::Judge(_) => "⚠️ Не удалось получить ответ от ИИ. Попробуйте еще раз чуть позже.".to_string(),
        BotError::Store(_) => "⚠️ База историй сейчас недоступна. Попробуйте позже.".to_string(),
        BotError::Export(_) => "⚠️ Не удалось подготовить файл.".to_string(),
        BotError::Validation(e) => format!("⚠️ {e}"),
        BotError::State(e) => format!("⚠️ Действие сейчас недоступно: {e}"),
    };
    let menu = match retry {
        Some(action) if err.is_retryable() => Menu::new().item("🔁 Повторить", action),
        _ => Menu::new(),
    };
    Screen::new("error", text, nav(menu))
}
