//! # Category Classification
//!
//! Maps a free-text item name (plus an optional category hint) to the fixed
//! [`Category`] set using an ordered rule list. The first rule with a
//! matching keyword wins, so the order of [`CATEGORY_RULES`] is part of the
//! behaviour: `frozen` outranks everything, `dairy` comes before
//! `beverages` so "milk drink" is dairy, `snacks` comes before `beverages`
//! and `condiments` so "chocolate" and "糖果" are snacks, and `vegetables`
//! comes before `eggs` so "eggplant" is a vegetable.
//!
//! Keywords are matched against `" {name} {hint} "` in lower case. A keyword
//! with a leading space only matches at the start of a word (" tea" does not
//! match "steak"); one with spaces on both sides only matches a whole word.
//!
//! Category names (as the AI parser returns them in the hint) are the last
//! rules in the list, so they only decide when no item keyword matched.

use crate::model::Category;
use tracing::trace;

/// Ordered (category, keywords) rules. English, French and Chinese keywords
/// share one list per category.
pub const CATEGORY_RULES: &[(Category, &[&str])] = &[
    (
        Category::Frozen,
        &[
            "frozen", "ice cream", "popsicle", "surgelé", "glace", "冷冻", "速冻", "冰淇淋",
            "雪糕", "冰棍", "水饺", "汤圆",
        ],
    ),
    (
        Category::Dairy,
        &[
            "milk", "cheese", "yogurt", "yoghurt", "butter", "cream", "lait", "fromage",
            "yaourt", "beurre", "crème", "牛奶", "奶酪", "芝士", "酸奶", "黄油", "奶油", "乳",
        ],
    ),
    (
        Category::Bakery,
        &[
            "bread", "baguette", "croissant", "bagel", "muffin", "cake", "toast", "brioche",
            "pain", "gâteau", "面包", "蛋糕", "吐司", "馒头", "包子",
        ],
    ),
    (
        Category::Snacks,
        &[
            "chips", "crisps", "cookie", "biscuit", "chocolate", "candy", "cracker", "popcorn",
            "nuts", "snack", "chocolat", "bonbon", "薯片", "饼干", "巧克力", "糖果", "零食",
            "坚果", "瓜子", "爆米花",
        ],
    ),
    (
        Category::Beverages,
        &[
            "juice", "soda", "cola", " water ", "sparkling", " tea", "coffee", "beer", "wine",
            "drink", "jus", " eau ", "café", "bière", " vin ", "饮料", "果汁", "汽水", "可乐",
            "矿泉水", "纯净水", "茶", "咖啡", "啤酒", "红酒", "白酒",
        ],
    ),
    (
        Category::Vegetables,
        &[
            "eggplant", "aubergine", "tomato", "potato", "onion", "garlic", "carrot", "lettuce",
            "cabbage", "broccoli", "spinach", "cucumber", "pepper", "celery", "mushroom",
            "zucchini", " peas", " corn", "sprout", "tomate", "pomme de terre", "oignon", "ail ",
            "carotte", "salade", "chou", "épinard", "champignon", "茄子", "番茄", "西红柿", "土豆", "洋葱",
            "大蒜", "蒜", "胡萝卜", "生菜", "白菜", "青菜", "菠菜", "黄瓜", "辣椒", "芹菜", "蘑菇",
            "香菇", "葱", "姜", "豆芽", "萝卜",
        ],
    ),
    (
        Category::Fruit,
        &[
            "apple", "banana", "orange", "lemon", " lime", "grape", "strawberr", "blueberr",
            "peach", " pear", "mango", "melon", "pineapple", "kiwi", "cherr", "pomme", "banane",
            "citron", "raisin", "fraise", "pêche", "poire", "苹果", "香蕉", "橙", "橘", "柠檬",
            "葡萄", "草莓", "蓝莓", "桃", "梨", "芒果", "西瓜", "哈密瓜", "菠萝", "猕猴桃", "樱桃",
        ],
    ),
    (
        Category::Eggs,
        &[" egg", "oeuf", "œuf", "鸡蛋", "鸭蛋", "鹌鹑蛋", "蛋"],
    ),
    (
        Category::Seafood,
        &[
            "fish", "salmon", "tuna", "shrimp", "prawn", "crab", "lobster", "cod", "squid",
            "clam", "mussel", "oyster", "poisson", "saumon", "thon", "crevette", "鱼", "虾",
            "蟹", "贝", "鱿鱼", "三文鱼", "海鲜", "蚝", "蛤",
        ],
    ),
    (
        Category::Meat,
        &[
            "beef", "pork", "chicken", "lamb", "turkey", "bacon", " ham", "sausage", "steak",
            "mince", "boeuf", "bœuf", "porc", "poulet", "agneau", "jambon", "saucisse", "牛肉",
            "猪肉", "鸡肉", "鸡腿", "鸡翅", "羊肉", "火腿", "香肠", "培根", "排骨", "肉",
        ],
    ),
    (
        Category::Grains,
        &[
            " rice", "pasta", "noodle", "flour", "oats", "cereal", "spaghetti", "quinoa",
            "lentil", " beans", "riz", "pâtes", "farine", "大米", "米饭", "面条", "面粉", "挂面",
            "燕麦", "小米", "豆",
        ],
    ),
    (
        Category::Condiments,
        &[
            "salt", "sugar", "sauce", "vinegar", " oil", "ketchup", "mustard", "mayonnaise",
            "spice", "honey", "jam", " sel ", "sucre", "vinaigre", "huile", "moutarde", "miel",
            "confiture", "盐", "糖", "酱油", "醋", "油", "酱", "味精", "鸡精", "蜂蜜", "料酒",
            "调料",
        ],
    ),
    (Category::Frozen, &["frozen food"]),
    (Category::Dairy, &["dairy"]),
    (Category::Bakery, &["bakery", "baked goods"]),
    (Category::Snacks, &["snacks"]),
    (Category::Beverages, &["beverage"]),
    (Category::Vegetables, &["vegetable", "produce"]),
    (Category::Fruit, &["fruit"]),
    (Category::Eggs, &["eggs"]),
    (Category::Seafood, &["seafood"]),
    (Category::Meat, &["meat"]),
    (Category::Grains, &["grain"]),
    (Category::Condiments, &["condiment"]),
];

/// Stateless name -> category classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryClassifier;

impl CategoryClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify an item. Total: every input, including the empty string,
    /// yields a category, [`Category::Other`] when no rule matches.
    pub fn classify(&self, name: &str, category_hint: Option<&str>) -> Category {
        let haystack = format!(
            " {} {} ",
            name.trim().to_lowercase(),
            category_hint.unwrap_or("").trim().to_lowercase()
        );

        let category = CATEGORY_RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|keyword| haystack.contains(keyword)))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Other);

        trace!(name = %name, hint = ?category_hint, category = %category, "Classified item");
        category
    }
}
